use lamtamnix_plugin::prelude::*;
use tracing::debug;

/// Returns its arguments unchanged and counts calls.
#[derive(Debug, Default)]
pub struct EchoPlugin {
    calls: u64,
}

impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        "echo"
    }

    fn on_load(&mut self) -> Result<(), String> {
        debug!(thread = ?std::thread::current().name(), "Echo plugin loaded");
        Ok(())
    }

    fn call(&mut self, method: &str, args: Value) -> Result<Value, String> {
        self.calls += 1;
        match method {
            "echo" => Ok(args),
            "calls" => Ok(json!(self.calls)),
            "thread" => Ok(json!(std::thread::current().name())),
            other => Err(format!("echo: unknown method '{other}'")),
        }
    }
}
