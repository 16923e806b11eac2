//! Shader management.

use crate::error::{RenderError, RenderResult};

/// Builder for WGSL modules with `{{NAME}}` placeholders.
///
/// Compute kernels take their work-group size as a compile-time constant,
/// so the size is substituted into the source before compilation.
pub struct ShaderBuilder {
    source: Option<String>,
    defines: Vec<(String, String)>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            defines: Vec::new(),
            label: None,
        }
    }

    /// Sets the shader source (WGSL).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replaces every `{{name}}` in the source with `value`.
    pub fn define(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.defines.push((name.into(), value.to_string()));
        self
    }

    /// Sets the shader label for debugging.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module.
    ///
    /// Compilation errors are captured with a validation error scope rather
    /// than reaching the device's uncaptured error handler.
    pub fn build_module(self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.expanded_source()?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilationFailed(err.to_string()));
        }

        Ok(module)
    }

    fn expanded_source(&self) -> RenderResult<String> {
        let mut source = self
            .source
            .clone()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing shader source".into()))?;

        for (name, value) in &self.defines {
            source = source.replace(&format!("{{{{{name}}}}}"), value);
        }

        if let Some(start) = source.find("{{") {
            let end = source[start..].find("}}").map_or(source.len(), |e| start + e + 2);
            return Err(RenderError::ShaderCompilationFailed(format!(
                "unresolved placeholder {}",
                &source[start..end]
            )));
        }

        Ok(source)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
