use super::*;

use crate::event::core::{CoreChannels, CoreOptions};

#[derive(Debug)]
struct Camera;

impl NativeImageSource for Camera {
    fn create_resource(&self) -> bool {
        true
    }
    fn destroy_resource(&self) {}
    fn target_texture(&self) -> u32 {
        0
    }
    fn width(&self) -> u32 {
        640
    }
    fn height(&self) -> u32 {
        480
    }
    fn custom_sampler_type_name(&self) -> Option<&str> {
        Some("samplerExternalOES")
    }
}

fn core() -> (Core, CoreChannels) {
    let (core, channels) = Core::new(CoreOptions::default());
    channels.messages.try_iter().for_each(drop);
    (core, channels)
}

fn render_commands(channels: &CoreChannels) -> Vec<RenderCommand> {
    channels
        .messages
        .try_iter()
        .filter_map(|m| match m {
            UpdateMessage::Render(command) => Some(command),
            _ => None,
        })
        .collect()
}

fn texture_2d(core: &Core, width: u32, height: u32) -> Texture {
    Texture::new(core, TextureType::Texture2D, PixelFormat::Rgba8888, width, height).unwrap()
}

fn rgba(width: u32, height: u32) -> PixelData {
    PixelData::new(
        vec![0; (width * height * 4) as usize],
        width,
        height,
        PixelFormat::Rgba8888,
    )
    .unwrap()
}

#[test]
fn creation_reserves_a_key_and_queues_the_texture() {
    let (core, channels) = core();
    let texture = texture_2d(&core, 64, 32);
    let key = texture.key().unwrap();
    assert_eq!(texture.width().unwrap(), 64);
    assert_eq!(texture.height().unwrap(), 32);
    match render_commands(&channels).as_slice() {
        [RenderCommand::CreateTexture {
            key: created,
            width: 64,
            height: 32,
            ..
        }] => assert_eq!(*created, key),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn out_of_bounds_uploads_fail_at_the_call_site() {
    let (core, channels) = core();
    let texture = texture_2d(&core, 16, 16);
    render_commands(&channels);

    let pixels = rgba(8, 8);
    let err = texture
        .upload_with(pixels.clone(), UploadParams::region(0, 0, 12, 0, 8, 8))
        .unwrap_err();
    assert!(matches!(err, TableauError::Validation(_)));
    let err = texture
        .upload_with(pixels.clone(), UploadParams::region(1, 0, 0, 0, 8, 8))
        .unwrap_err();
    assert!(matches!(err, TableauError::Validation(_)));
    assert!(render_commands(&channels).is_empty());

    texture
        .upload_with(pixels, UploadParams::region(0, 0, 8, 8, 8, 8))
        .unwrap();
    assert!(matches!(
        render_commands(&channels).as_slice(),
        [RenderCommand::UploadTexture { .. }]
    ));
}

#[test]
fn compressed_data_must_match_the_texture_format() {
    let (core, _channels) = core();
    let texture = texture_2d(&core, 16, 16);
    let etc = PixelData::new(vec![0; 128], 16, 16, PixelFormat::CompressedRgb8Etc2).unwrap();
    assert!(matches!(
        texture.upload(etc),
        Err(TableauError::Validation(_))
    ));
}

#[test]
fn deferred_textures_take_their_shape_from_uploads() {
    let (core, _channels) = core();
    let texture = Texture::new_deferred(&core, TextureType::Texture2D).unwrap();
    assert_eq!(texture.width().unwrap(), 0);

    texture.upload(rgba(20, 10)).unwrap();
    assert_eq!(texture.width().unwrap(), 20);
    assert_eq!(texture.height().unwrap(), 10);

    let rgb = PixelData::new(vec![0; 4 * 4 * 3], 4, 4, PixelFormat::Rgb888).unwrap();
    texture.upload(rgb).unwrap();
    assert_eq!(texture.width().unwrap(), 4);
    assert_eq!(texture.format().unwrap(), PixelFormat::Rgb888);
}

#[test]
fn deferred_upload_past_the_largest_extent_fails_cleanly() {
    let (core, channels) = core();
    let texture = Texture::new_deferred(&core, TextureType::Texture2D).unwrap();
    render_commands(&channels);

    let wide = UploadParams::region(0, 0, u32::MAX, 0, 1, 1);
    assert!(matches!(
        texture.upload_with(rgba(1, 1), wide),
        Err(TableauError::Validation(_))
    ));
    let tall = UploadParams::region(0, 0, 0, u32::MAX, 1, 1);
    assert!(matches!(
        texture.upload_with(rgba(1, 1), tall),
        Err(TableauError::Validation(_))
    ));
    assert_eq!(texture.width().unwrap(), 0);
    assert!(render_commands(&channels).is_empty());
}

#[test]
fn native_textures_refuse_uploads_and_rewrite_shaders() {
    let (core, channels) = core();
    let texture = Texture::new_native(&core, Arc::new(Camera)).unwrap();
    assert!(texture.is_native());
    assert_eq!(texture.width().unwrap(), 640);
    assert!(matches!(
        render_commands(&channels).as_slice(),
        [RenderCommand::CreateNativeTexture { .. }]
    ));
    assert!(matches!(
        texture.upload(rgba(2, 2)),
        Err(TableauError::Contract(_))
    ));

    let mut shader = String::from("uniform sampler2D sTexture;");
    assert!(texture.apply_native_fragment_shader(&mut shader));
    assert_eq!(shader, "uniform samplerExternalOES sTexture;");

    let plain = texture_2d(&core, 2, 2);
    let mut shader = String::from("uniform sampler2D sTexture;");
    assert!(!plain.apply_native_fragment_shader(&mut shader));
}

#[test]
fn empty_handles_report_invalid_handle() {
    let texture = Texture::default();
    assert!(texture.is_empty());
    assert!(!texture.is_native());
    assert!(matches!(texture.width(), Err(TableauError::InvalidHandle(_))));
    assert!(matches!(
        texture.upload(rgba(1, 1)),
        Err(TableauError::InvalidHandle(_))
    ));
    assert!(matches!(
        texture.generate_mipmaps(),
        Err(TableauError::InvalidHandle(_))
    ));
    let mut shader = String::from("sampler2D");
    assert!(!texture.apply_native_fragment_shader(&mut shader));
}

#[test]
fn dropping_the_last_handle_destroys_the_texture() {
    let (core, channels) = core();
    let texture =
        Texture::new(&core, TextureType::TextureCube, PixelFormat::Rgba8888, 8, 8).unwrap();
    let key = texture.key().unwrap();
    let copy = texture.clone();
    drop(texture);
    render_commands(&channels);
    drop(copy);
    match render_commands(&channels).as_slice() {
        [RenderCommand::DestroyTexture { key: destroyed }] => assert_eq!(*destroyed, key),
        other => panic!("unexpected {other:?}"),
    }
}
