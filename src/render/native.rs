//! Textures backed by platform images instead of uploaded pixels.

use std::fmt::Debug;

const DEFAULT_SAMPLER_TYPE: &str = "sampler2D";

/// Platform image that a texture can sample directly.
///
/// `create_resource` / `destroy_resource` bracket the backend binding. The render side keeps the
/// two balanced: every successful create is matched by exactly one destroy.
pub trait NativeImageSource: Send + Sync + Debug {
    /// Bind the platform image to the backend. Returns `false` on failure.
    fn create_resource(&self) -> bool;

    /// Release what [`NativeImageSource::create_resource`] acquired.
    fn destroy_resource(&self);

    /// Attach the image to the currently bound texture target. `0` means success; anything else
    /// is a backend error code.
    fn target_texture(&self) -> u32;

    /// Called before each bind.
    fn prepare_texture(&self) {}

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn requires_blending(&self) -> bool {
        false
    }

    /// Text prepended to fragment shaders that sample this image.
    fn custom_fragment_prefix(&self) -> Option<&str> {
        None
    }

    /// Sampler type replacing `sampler2D` in fragment shaders that sample this image.
    fn custom_sampler_type_name(&self) -> Option<&str> {
        None
    }
}

/// Rewrite `shader` so it can sample `native`: the custom prefix is prepended and every
/// `sampler2D` becomes the custom sampler type. Returns whether the source changed; an empty
/// shader is left alone.
pub fn apply_native_fragment_shader(native: &dyn NativeImageSource, shader: &mut String) -> bool {
    if shader.is_empty() {
        return false;
    }
    let mut modified = false;
    if let Some(prefix) = native.custom_fragment_prefix().filter(|p| !p.is_empty()) {
        shader.insert_str(0, prefix);
        modified = true;
    }
    if let Some(sampler) = native.custom_sampler_type_name().filter(|s| !s.is_empty()) {
        if shader.contains(DEFAULT_SAMPLER_TYPE) {
            *shader = shader.replace(DEFAULT_SAMPLER_TYPE, sampler);
        }
        modified = true;
    }
    modified
}
