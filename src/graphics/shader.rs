//! Immutable shader payloads shared between the application and the render side.

use std::sync::OnceLock;

use crate::foundation::error::{TableauError, TableauResult};

const VERSION_TAG: &str = "//@version";

/// How shader stages are encoded.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ShaderSourceMode {
    #[default]
    Text,
    Binary,
}

/// Pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Rendering hints attached to a shader.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ShaderHints(u32);

impl ShaderHints {
    pub const NONE: Self = Self(0);
    /// The fragment output may be transparent.
    pub const OUTPUT_IS_TRANSPARENT: Self = Self(1 << 0);
    /// The vertex stage moves geometry outside the node's bounds.
    pub const MODIFIES_GEOMETRY: Self = Self(1 << 1);

    /// Whether every bit of `hint` is set.
    pub fn contains(self, hint: Self) -> bool {
        self.0 & hint.0 == hint.0
    }

    /// Union of two hint sets.
    pub fn with(self, hint: Self) -> Self {
        Self(self.0 | hint.0)
    }
}

/// Shader sources (or binaries) plus metadata. Contents never change after construction; only
/// the hash is written once, by whoever computes it first.
#[derive(Debug)]
pub struct ShaderData {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
    vertex_version: u32,
    fragment_version: u32,
    mode: ShaderSourceMode,
    hints: ShaderHints,
    render_pass_tag: u32,
    name: String,
    binary: Vec<u8>,
    hash: OnceLock<u64>,
}

impl ShaderData {
    /// Text-mode shader.
    pub fn new(
        vertex: &str,
        fragment: &str,
        hints: ShaderHints,
        render_pass_tag: u32,
        name: impl Into<String>,
    ) -> Self {
        Self::with_mode(
            vertex.as_bytes().to_vec(),
            fragment.as_bytes().to_vec(),
            ShaderSourceMode::Text,
            hints,
            render_pass_tag,
            name.into(),
        )
    }

    /// Binary-mode shader.
    pub fn new_binary(
        vertex: Vec<u8>,
        fragment: Vec<u8>,
        hints: ShaderHints,
        render_pass_tag: u32,
        name: impl Into<String>,
    ) -> Self {
        Self::with_mode(
            vertex,
            fragment,
            ShaderSourceMode::Binary,
            hints,
            render_pass_tag,
            name.into(),
        )
    }

    fn with_mode(
        vertex: Vec<u8>,
        fragment: Vec<u8>,
        mode: ShaderSourceMode,
        hints: ShaderHints,
        render_pass_tag: u32,
        name: String,
    ) -> Self {
        Self {
            vertex_version: parse_version(&vertex),
            fragment_version: parse_version(&fragment),
            vertex,
            fragment,
            mode,
            hints,
            render_pass_tag,
            name,
            binary: Vec::new(),
            hash: OnceLock::new(),
        }
    }

    /// Stage payload.
    pub fn shader_for_stage(&self, stage: ShaderStage) -> &[u8] {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    /// Version declared by the stage's `//@version` tag, `0` when absent.
    pub fn version(&self, stage: ShaderStage) -> u32 {
        match stage {
            ShaderStage::Vertex => self.vertex_version,
            ShaderStage::Fragment => self.fragment_version,
        }
    }

    /// Encoding of the stage payloads.
    pub fn source_mode(&self) -> ShaderSourceMode {
        self.mode
    }

    /// Rendering hints.
    pub fn hints(&self) -> ShaderHints {
        self.hints
    }

    /// Whether `hint` is set.
    pub fn hint_enabled(&self, hint: ShaderHints) -> bool {
        self.hints.contains(hint)
    }

    /// Tag matching this shader with render tasks.
    pub fn render_pass_tag(&self) -> u32 {
        self.render_pass_tag
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the sources. Fails until [`Self::set_hash`] has been called.
    pub fn hash(&self) -> TableauResult<u64> {
        self.hash
            .get()
            .copied()
            .ok_or_else(|| TableauError::contract(format!("shader '{}' has no hash yet", self.name)))
    }

    /// Record the hash. Fails when a hash was already set.
    pub fn set_hash(&self, hash: u64) -> TableauResult<()> {
        self.hash
            .set(hash)
            .map_err(|_| TableauError::contract(format!("shader '{}' hash already set", self.name)))
    }

    /// Reserve `size` bytes for a compiled program binary.
    pub fn allocate_buffer(&mut self, size: usize) {
        self.binary.resize(size, 0);
    }

    /// Compiled program binary, empty until allocated.
    pub fn buffer(&self) -> &[u8] {
        &self.binary
    }

    /// Writable program binary.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.binary
    }

    /// Whether a program binary is present.
    pub fn has_binary(&self) -> bool {
        !self.binary.is_empty()
    }
}

/// Only the first occurrence of the tag counts, and only at the start of a line.
fn parse_version(code: &[u8]) -> u32 {
    let text = String::from_utf8_lossy(code);
    let Some(pos) = text.find(VERSION_TAG) else {
        return 0;
    };
    if pos != 0 && !text[..pos].ends_with('\n') {
        return 0;
    }
    let rest = text[pos + VERSION_TAG.len()..].trim_start();
    let digits: &str = &rest[..rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len())];
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/shader.rs"]
mod tests;
