//! Script sandbox used to run extracted signature transforms

use deno_core::{FastString, JsRuntime, RuntimeOptions};
use tracing::debug;

use crate::error::ResolveError;

/// Isolated script context that can load sources and call one function
pub trait ScriptSandbox {
    /// Evaluate a source fragment, keeping its definitions for later calls
    fn load(&mut self, source: &str) -> Result<(), ResolveError>;

    /// Call a loaded function with one string argument; the result must be a string
    fn call(&mut self, function: &str, argument: &str) -> Result<String, ResolveError>;
}

/// Creates fresh sandboxes for each decipher engine
pub trait SandboxFactory: Send + Sync {
    fn create(&self) -> Box<dyn ScriptSandbox>;
}

/// V8-backed sandbox without any host extensions.
///
/// The isolate is created on first use, so an engine that never deciphers
/// never starts V8.
pub struct DenoSandbox {
    runtime: Option<JsRuntime>,
}

impl DenoSandbox {
    /// Create a new sandbox
    pub fn new() -> Self {
        Self { runtime: None }
    }

    fn runtime(&mut self) -> &mut JsRuntime {
        self.runtime
            .get_or_insert_with(|| JsRuntime::new(RuntimeOptions::default()))
    }
}

impl Default for DenoSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptSandbox for DenoSandbox {
    fn load(&mut self, source: &str) -> Result<(), ResolveError> {
        debug!("Loading {} chars into sandbox", source.len());
        self.runtime()
            .execute_script("<transform>", FastString::from(source.to_string()))
            .map_err(|e| ResolveError::Execution(format!("Script evaluation failed: {:?}", e)))?;
        Ok(())
    }

    fn call(&mut self, function: &str, argument: &str) -> Result<String, ResolveError> {
        if !is_identifier(function) {
            return Err(ResolveError::Execution(format!(
                "Not a callable identifier: {}",
                function
            )));
        }

        let literal = serde_json::to_string(argument)?;
        let call_code = format!("{}({})", function, literal);
        let runtime = self.runtime();
        let result = runtime
            .execute_script("<call>", FastString::from(call_code))
            .map_err(|e| ResolveError::Execution(format!("Call to {} failed: {:?}", function, e)))?;

        let scope = &mut runtime.handle_scope();
        let value = result.open(scope);
        if !value.is_string() {
            return Err(ResolveError::Execution(format!(
                "{} returned a non-string value",
                function
            )));
        }
        Ok(value.to_rust_string_lossy(scope))
    }
}

/// Factory for [`DenoSandbox`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoSandboxFactory;

impl SandboxFactory for DenoSandboxFactory {
    fn create(&self) -> Box<dyn ScriptSandbox> {
        Box::new(DenoSandbox::new())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
