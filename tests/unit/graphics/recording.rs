use super::*;
use crate::foundation::core::Rect;
use crate::graphics::format::{GraphicsFormat, PixelFormat};
use crate::graphics::pixel_data::PixelData;
use smallvec::smallvec;

fn create_info(texture_type: TextureType, format: GraphicsFormat, size: u32) -> TextureCreateInfo {
    TextureCreateInfo {
        texture_type,
        format,
        width: size,
        height: size,
        native: false,
        allocation: AllocationPolicy::Creation,
    }
}

fn update(texture: TextureHandle, dst: Rect, kind: TextureUpdateKind) -> TextureUpdateInfo {
    TextureUpdateInfo {
        texture,
        layer: 0,
        level: 0,
        dst,
        src_offset: 0,
        src_size: 0,
        src_stride: 0,
        src_format: GraphicsFormat::R8G8B8A8Unorm,
        source: 0,
        kind,
    }
}

fn source(size: u32) -> TextureUpdateSource {
    TextureUpdateSource {
        pixels: PixelData::new(
            vec![0; (size * size * 4) as usize],
            size,
            size,
            PixelFormat::Rgba8888,
        )
        .unwrap(),
    }
}

#[test]
fn trace_stack_queries() {
    let mut stack = TraceCallStack::new(true);
    stack.push_call("TexImage2D", "3553, 0, 4, 4");
    stack.push_call("TexImage2D", "3553, 1, 2, 2");
    stack.push_call("GenerateMipmap", "3553");
    assert!(stack.find_method("GenerateMipmap"));
    assert!(stack.find_method_and_params("TexImage2D", "3553, 1, 2, 2"));
    assert_eq!(
        stack.find_index_of_method_and_params("GenerateMipmap", "3553"),
        Some(2)
    );
    assert_eq!(stack.count_method("TexImage2D"), 2);
    stack.reset();
    assert!(stack.is_empty());

    stack.enable(false);
    stack.push_call("TexImage2D", "");
    assert!(stack.is_empty());
}

#[test]
fn creation_reserves_one_image_per_layer() {
    let mut controller = RecordingController::new(ControllerOptions::default());
    controller
        .create_texture(&create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 64))
        .unwrap();
    assert_eq!(controller.texture_trace().count_method("TexImage2D"), 1);
    assert!(controller
        .texture_trace()
        .find_method_and_params("TexImage2D", "3553, 0, 64, 64"));

    controller.texture_trace_mut().reset();
    controller
        .create_texture(&create_info(TextureType::TextureCube, GraphicsFormat::R8G8B8A8Unorm, 8))
        .unwrap();
    assert_eq!(controller.texture_trace().count_method("TexImage2D"), 6);
    for face in 0..6 {
        let params = format!("{}, 0, 8, 8", GL_TEXTURE_CUBE_MAP_POSITIVE_X + face);
        assert!(controller
            .texture_trace()
            .find_method_and_params("TexImage2D", &params));
    }
}

#[test]
fn compressed_and_native_creation() {
    let mut controller = RecordingController::new(ControllerOptions::default());
    controller
        .create_texture(&create_info(
            TextureType::Texture2D,
            GraphicsFormat::Etc2R8G8B8UnormBlock,
            16,
        ))
        .unwrap();
    assert_eq!(controller.texture_trace().count_method("CompressedTexImage2D"), 1);
    assert_eq!(controller.texture_trace().count_method("TexImage2D"), 0);

    controller.texture_trace_mut().reset();
    let mut native = create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 16);
    native.native = true;
    controller.create_texture(&native).unwrap();
    assert!(!controller.texture_trace().find_method("TexImage2D"));
    assert!(controller.texture_trace().find_method("GenTextures"));
}

#[test]
fn uploads_route_by_kind() {
    let mut controller = RecordingController::new(ControllerOptions::default());
    let texture = controller
        .create_texture(&create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 64))
        .unwrap();
    controller.texture_trace_mut().reset();

    controller
        .update_textures(
            &[
                update(texture, Rect::from_size(64, 64), TextureUpdateKind::Full),
                update(texture, Rect::new(0, 0, 32, 32), TextureUpdateKind::Sub),
            ],
            &[source(64)],
        )
        .unwrap();

    let trace = controller.texture_trace();
    assert!(trace.find_method_and_params("TexImage2D", "3553, 0, 64, 64"));
    assert!(trace.find_method_and_params("TexSubImage2D", "3553, 0, 0, 0, 32, 32"));
    assert_eq!(controller.summary().uploads, 2);
}

#[test]
fn invalid_updates_are_rejected() {
    let mut controller = RecordingController::new(ControllerOptions::default());
    let texture = controller
        .create_texture(&create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 4))
        .unwrap();
    let bad_source = update(texture, Rect::from_size(4, 4), TextureUpdateKind::Full);
    assert!(controller.update_textures(&[bad_source], &[]).is_err());

    let unknown = update(TextureHandle(999), Rect::from_size(4, 4), TextureUpdateKind::Full);
    assert!(controller.update_textures(&[unknown], &[source(4)]).is_err());
}

#[test]
fn oversized_textures_fail() {
    let mut controller = RecordingController::new(ControllerOptions {
        trace: true,
        max_texture_size: 32,
    });
    assert!(controller
        .create_texture(&create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 64))
        .is_err());
}

#[test]
fn mipmaps_submit_and_teardown() {
    let mut controller = RecordingController::new(ControllerOptions::default());
    let texture = controller
        .create_texture(&create_info(TextureType::Texture2D, GraphicsFormat::R8G8B8A8Unorm, 4))
        .unwrap();
    controller.generate_texture_mipmaps(texture).unwrap();
    assert!(controller
        .texture_trace()
        .find_method_and_params("GenerateMipmap", "3553"));

    controller
        .submit(&SubmitInfo {
            textures: vec![texture],
            draw_calls: 1,
        })
        .unwrap();
    controller.present().unwrap();
    let params = format!("3553, {}", texture.0);
    assert!(controller
        .texture_trace()
        .find_method_and_params("BindTexture", &params));

    let frame_buffer = controller
        .create_frame_buffer(&FrameBufferCreateInfo {
            width: 4,
            height: 4,
            color: smallvec![texture],
            depth: None,
            depth_stencil: None,
        })
        .unwrap();
    controller.destroy_frame_buffer(frame_buffer);
    controller.destroy_texture(texture);
    controller.destroy_texture(texture);

    let summary = controller.summary();
    assert_eq!(summary.textures_created, 1);
    assert_eq!(summary.textures_live, 0);
    assert_eq!(summary.frame_buffers_live, 0);
    assert_eq!((summary.submits, summary.presents), (1, 1));
    assert_eq!(controller.texture_trace().count_method("DeleteTextures"), 1);
}
