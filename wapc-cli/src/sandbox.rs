//! Isolated script execution.
//!
//! A [`ScriptSandbox`] owns one QuickJS runtime and context. Creating it
//! installs the logging globals and any host callbacks, establishes the
//! `js_exports` table, and evaluates a bundled script that fills the table.
//! Exports are then called by name with JSON-encoded arguments.
//!
//! A sandbox is single-use per unit of work and is neither `Send` nor
//! `Sync`. Engine resources are released when it is dropped.

use crate::error::{ResolveError, SandboxError};
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, Rest};
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Exception, Function, Object, Runtime, Value,
};
use serde_json::Value as JsonValue;
use std::rc::Rc;

/// Global table bundled scripts register their exports in.
pub const EXPORTS_TABLE: &str = "js_exports";

/// Global name of the import resolver host function.
pub const RESOLVER_CALLBACK: &str = "resolverCallback";

const EXPORTS_PREAMBLE: &str = "var js_exports = {};";

/// Host functions a script may call back into.
///
/// Each callback is a method, so the capability surface of a sandbox is
/// fixed by the implementation handed to [`ScriptSandbox::new`].
pub trait HostCallbacks {
    /// Return the source text of an imported schema.
    ///
    /// An `Err` is thrown into the script as an `Error` carrying the
    /// resolver's message.
    fn resolve(&self, location: &str, from: Option<&str>) -> Result<String, ResolveError>;
}

/// Result of invoking a script export.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// A string result, returned directly.
    String(String),
    /// A 32-bit integer result, returned directly.
    Int(i32),
    /// Any other result, decoded from its JSON form.
    Structured(JsonValue),
}

impl ScriptValue {
    /// Borrow the string result, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Take the string result, if this is one.
    pub fn into_string(self) -> Option<String> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// View any result as JSON.
    pub fn into_json(self) -> JsonValue {
        match self {
            ScriptValue::String(s) => JsonValue::String(s),
            ScriptValue::Int(i) => JsonValue::from(i),
            ScriptValue::Structured(v) => v,
        }
    }
}

/// An isolated script execution context.
pub struct ScriptSandbox {
    context: Context,
    _runtime: Runtime,
}

impl ScriptSandbox {
    /// Create a sandbox and evaluate `script` inside it.
    ///
    /// `callbacks` is installed as the host function set; `None` leaves the
    /// script with only the logging globals.
    pub fn new(script: &str, callbacks: Option<Rc<dyn HostCallbacks>>) -> Result<Self, SandboxError> {
        let runtime = Runtime::new().map_err(|e| SandboxError::Engine(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| SandboxError::Engine(e.to_string()))?;

        context.with(|ctx| -> Result<(), SandboxError> {
            install_globals(&ctx, callbacks)
                .catch(&ctx)
                .map_err(caught_error)?;
            ctx.eval::<(), _>(EXPORTS_PREAMBLE)
                .catch(&ctx)
                .map_err(caught_error)?;
            ctx.eval::<(), _>(script).catch(&ctx).map_err(caught_error)?;
            Ok(())
        })?;

        tracing::debug!(bytes = script.len(), "script sandbox created");
        Ok(Self {
            context,
            _runtime: runtime,
        })
    }

    /// Call export `name` with `args`.
    ///
    /// Arguments cross the boundary as JSON. String and int32 results come
    /// back as-is; everything else is decoded from its JSON form.
    pub fn invoke(&self, name: &str, args: &[JsonValue]) -> Result<ScriptValue, SandboxError> {
        let encoded = args
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SandboxError::Marshal(e.to_string()))?;

        self.context.with(|ctx| {
            let exports: Object = ctx
                .globals()
                .get(EXPORTS_TABLE)
                .catch(&ctx)
                .map_err(caught_error)?;
            let function: Option<Function> = exports.get(name).catch(&ctx).map_err(caught_error)?;
            let function = function.ok_or_else(|| SandboxError::MissingExport {
                name: name.to_string(),
            })?;

            let mut values = Vec::with_capacity(encoded.len());
            for json in encoded {
                values.push(ctx.json_parse(json).catch(&ctx).map_err(caught_error)?);
            }

            let result: Value = function
                .call((Rest(values),))
                .catch(&ctx)
                .map_err(caught_error)?;
            script_value(&ctx, result)
        })
    }

    /// Release the sandbox. Equivalent to dropping it.
    pub fn dispose(self) {}
}

impl Drop for ScriptSandbox {
    fn drop(&mut self) {
        tracing::debug!("script sandbox disposed");
    }
}

fn install_globals<'js>(
    ctx: &Ctx<'js>,
    callbacks: Option<Rc<dyn HostCallbacks>>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), print_line)?)?;
    globals.set("console", console)?;
    globals.set("println", Function::new(ctx.clone(), print_line)?)?;

    if let Some(callbacks) = callbacks {
        let resolve = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, location: String, from: Opt<Option<String>>| {
                callbacks
                    .resolve(&location, from.0.flatten().as_deref())
                    .map_err(|e| Exception::throw_message(&ctx, &e.to_string()))
            },
        )?;
        globals.set(RESOLVER_CALLBACK, resolve)?;
    }

    Ok(())
}

fn print_line(args: Rest<Coerced<String>>) {
    let line = args
        .0
        .into_iter()
        .map(|arg| arg.0)
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
}

fn script_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<ScriptValue, SandboxError> {
    if let Some(s) = value.as_string() {
        return s
            .to_string()
            .map(ScriptValue::String)
            .map_err(|e| SandboxError::Marshal(e.to_string()));
    }
    if let Some(i) = value.as_int() {
        return Ok(ScriptValue::Int(i));
    }

    // `undefined` and functions have no JSON form.
    let Some(json) = ctx.json_stringify(value).catch(ctx).map_err(caught_error)? else {
        return Ok(ScriptValue::Structured(JsonValue::Null));
    };
    let text = json
        .to_string()
        .map_err(|e| SandboxError::Marshal(e.to_string()))?;
    serde_json::from_str(&text)
        .map(ScriptValue::Structured)
        .map_err(|e| SandboxError::Marshal(e.to_string()))
}

fn caught_error(err: CaughtError<'_>) -> SandboxError {
    match err {
        CaughtError::Exception(exception) => SandboxError::exception(exception_message(&exception)),
        CaughtError::Value(value) => SandboxError::exception(
            value
                .get::<Coerced<String>>()
                .map(|s| s.0)
                .unwrap_or_else(|_| "uncaught exception".to_string()),
        ),
        CaughtError::Error(e) => SandboxError::Engine(e.to_string()),
    }
}

/// `Name: message`, the way thrown errors print.
fn exception_message(exception: &Exception<'_>) -> String {
    let message = exception.message().unwrap_or_default();
    match exception.as_object().get::<_, String>("name") {
        Ok(name) if !name.is_empty() => format!("{name}: {message}"),
        _ => message,
    }
}
