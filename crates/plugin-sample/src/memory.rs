use std::time::{Duration, Instant};

use lamtamnix_plugin::prelude::*;

/// Grows its heap on request, for exercising resource accounting.
#[derive(Debug, Default)]
pub struct MemoryPlugin {
    objects: Vec<Box<[u8; 64]>>,
}

impl MemoryPlugin {
    fn count_arg(args: &Value) -> Result<usize, String> {
        args.get("count")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| "expected {\"count\": <unsigned integer>}".to_string())
    }
}

impl Plugin for MemoryPlugin {
    fn name(&self) -> &str {
        "memory"
    }

    fn call(&mut self, method: &str, args: Value) -> Result<Value, String> {
        match method {
            "get_int" => Ok(json!(42)),
            "increase_memory_usage" => {
                let count = Self::count_arg(&args)?;
                self.objects.extend((0..count).map(|_| Box::new([0u8; 64])));
                Ok(json!(self.objects.len()))
            }
            "release" => {
                let released = self.objects.len();
                self.objects = Vec::new();
                Ok(json!(released))
            }
            "busy" => {
                let millis = args.get("millis").and_then(Value::as_u64).unwrap_or(10);
                let until = Instant::now() + Duration::from_millis(millis);
                let mut spins: u64 = 0;
                while Instant::now() < until {
                    spins = spins.wrapping_add(1);
                    std::hint::spin_loop();
                }
                Ok(json!(spins))
            }
            other => Err(format!("memory: unknown method '{other}'")),
        }
    }
}
