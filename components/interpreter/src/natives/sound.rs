//! `Sound`, a host object. There is no mixer behind it; the object keeps
//! the state scripts can observe.

use std::any::Any;

use core_types::{ObjectId, ScriptResult, Value};
use memory_manager::HostObject;
use tracing::debug;

use super::{builtin, NativeCall};
use crate::runtime::Runtime;

/// State behind a `Sound` object.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundState {
    /// 0 to 100
    pub volume: f64,
    /// -100 (left) to 100 (right)
    pub pan: f64,
    /// `start` was called more recently than `stop`
    pub playing: bool,
    /// Linkage name given to `attachSound`
    pub attached: Option<String>,
}

impl Default for SoundState {
    fn default() -> Self {
        SoundState {
            volume: 100.0,
            pan: 0.0,
            playing: false,
            attached: None,
        }
    }
}

impl HostObject for SoundState {
    fn class_name(&self) -> &str {
        "Sound"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.new_object();
    super::constructor(rt, "Sound", sound_ctor, proto);
    builtin(rt, "Sound", "attachSound", attach_sound);
    builtin(rt, "Sound", "start", start);
    builtin(rt, "Sound", "stop", stop);
    builtin(rt, "Sound", "setVolume", set_volume);
    builtin(rt, "Sound", "getVolume", get_volume);
    builtin(rt, "Sound", "setPan", set_pan);
    builtin(rt, "Sound", "getPan", get_pan);
}

fn sound_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let proto = match rt.get_object_member(call.callee, "prototype")? {
        Value::Object(p) => Some(p),
        _ => None,
    };
    let sound = rt.new_host(Box::new(SoundState::default()), proto);
    Ok(Value::Object(sound))
}

fn with_state<R>(
    rt: &mut Runtime,
    this: Option<ObjectId>,
    f: impl FnOnce(&mut SoundState) -> R,
) -> Option<R> {
    this.and_then(|id| rt.heap_mut().host_mut::<SoundState>(id))
        .map(f)
}

fn attach_sound(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let name = rt.to_string_value(&call.arg(0))?;
    with_state(rt, call.this_object(), |s| s.attached = Some(name));
    Ok(Value::Undefined)
}

fn start(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let attached = with_state(rt, call.this_object(), |s| {
        s.playing = true;
        s.attached.clone()
    });
    debug!(sound = ?attached.flatten(), "sound start");
    Ok(Value::Undefined)
}

fn stop(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    with_state(rt, call.this_object(), |s| s.playing = false);
    Ok(Value::Undefined)
}

fn set_volume(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let volume = rt.to_number_value(&call.arg(0))?;
    if volume.is_finite() {
        with_state(rt, call.this_object(), |s| s.volume = volume.clamp(0.0, 100.0));
    }
    Ok(Value::Undefined)
}

fn get_volume(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(with_state(rt, call.this_object(), |s| Value::Number(s.volume)).unwrap_or_default())
}

fn set_pan(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let pan = rt.to_number_value(&call.arg(0))?;
    if pan.is_finite() {
        with_state(rt, call.this_object(), |s| s.pan = pan.clamp(-100.0, 100.0));
    }
    Ok(Value::Undefined)
}

fn get_pan(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(with_state(rt, call.this_object(), |s| Value::Number(s.pan)).unwrap_or_default())
}
