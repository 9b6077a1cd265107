//! Incremental jq post-processing over the streaming buffer.
//!
//! Each output that declares a `jq` program owns a buffer holding the
//! running concatenation of streamed tokens. After every chunk the buffer is
//! parsed as partial JSON, overlaid on memory to form a speculative
//! document, and the program is applied with the output's schema as a hint.
//! A non-empty result is committed to memory immediately so consumers can
//! watch values take shape mid-stream.

use crate::definition::Output;
use crate::events::Event;
use crate::jq::run_jq;
use crate::machine::Synth;
use crate::partial_json::parse_partial;
use serde_json::Value;

impl Synth {
    /// Feed one chunk (possibly empty, to flush) into the buffer for
    /// `output` and run its jq program over the speculative document.
    pub(crate) fn post_process(&mut self, output: &Output, chunk: &str) -> Option<Event> {
        let key = output.key.as_str();
        let program = output.jq.as_deref()?;

        let speculative = {
            let buffer = self.buffers.entry(key.to_string()).or_default();
            if chunk.is_empty() {
                self.memory.snapshot()
            } else {
                buffer.push_str(chunk);
                match parse_partial(buffer) {
                    Some(Value::Object(partial)) => {
                        let mut speculative = self.memory.clone();
                        speculative.merge(Value::Object(partial));
                        speculative.snapshot()
                    }
                    _ => self.memory.snapshot(),
                }
            }
        };

        let result = run_jq(program, &speculative, output.schema.as_ref())?;
        self.memory.set(key, result.clone());
        Some(Event::Jq {
            key: key.to_string(),
            result,
        })
    }

    /// Drop the streaming buffer for `key`. Called when a prompt output is
    /// discarded so a retry starts from a clean document.
    pub(crate) fn clear_buffer(&mut self, key: &str) {
        self.buffers.remove(key);
    }
}
