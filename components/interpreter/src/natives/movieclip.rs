//! `MovieClip` methods. Clip state lives with the display collaborator; these
//! natives translate script calls into display and timeline requests.

use core_types::{ObjectId, ScriptResult, Value};
use memory_manager::{ObjectKind, ScriptObject};

use super::{builtin, constructor, NativeCall};
use crate::display::StandardProperty;
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().movie_clip;
    constructor(rt, "MovieClip", movie_clip_ctor, proto);
    builtin(rt, "MovieClip", "play", play);
    builtin(rt, "MovieClip", "stop", stop);
    builtin(rt, "MovieClip", "gotoAndPlay", goto_and_play);
    builtin(rt, "MovieClip", "gotoAndStop", goto_and_stop);
    builtin(rt, "MovieClip", "nextFrame", next_frame);
    builtin(rt, "MovieClip", "prevFrame", prev_frame);
    builtin(rt, "MovieClip", "getBytesLoaded", get_bytes);
    builtin(rt, "MovieClip", "getBytesTotal", get_bytes);
    builtin(rt, "MovieClip", "createEmptyMovieClip", create_empty_movie_clip);
    builtin(rt, "MovieClip", "duplicateMovieClip", duplicate_movie_clip);
    builtin(rt, "MovieClip", "removeMovieClip", remove_movie_clip);
    builtin(rt, "MovieClip", "startDrag", start_drag);
    builtin(rt, "MovieClip", "stopDrag", stop_drag);
}

fn movie_clip_ctor(_rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Undefined)
}

fn this_clip(rt: &Runtime, call: &NativeCall<'_>) -> Option<ObjectId> {
    call.this_object().filter(|id| rt.display().contains(*id))
}

fn play(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    if let Some(clip) = this_clip(rt, &call) {
        rt.display_mut().set_playing(clip, true);
    }
    Ok(Value::Undefined)
}

fn stop(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    if let Some(clip) = this_clip(rt, &call) {
        rt.display_mut().set_playing(clip, false);
    }
    Ok(Value::Undefined)
}

/// Frame numbers are 1-based in scripts; strings name labels.
fn goto(rt: &mut Runtime, call: &NativeCall<'_>, play: bool) -> ScriptResult<()> {
    let Some(clip) = this_clip(rt, call) else {
        return Ok(());
    };
    match call.arg(0) {
        Value::String(label) => match label.parse::<u32>() {
            Ok(frame) => rt.goto_frame(clip, frame.saturating_sub(1), play),
            Err(_) => {
                rt.goto_label(clip, &label, play);
            }
        },
        frame => {
            let n = rt.to_number_value(&frame)?;
            if n.is_finite() && n >= 1.0 {
                rt.goto_frame(clip, n as u32 - 1, play);
            }
        }
    }
    Ok(())
}

fn goto_and_play(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    goto(rt, &call, true)?;
    Ok(Value::Undefined)
}

fn goto_and_stop(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    goto(rt, &call, false)?;
    Ok(Value::Undefined)
}

fn step(rt: &mut Runtime, call: &NativeCall<'_>, forward: bool) {
    let Some(clip) = this_clip(rt, call) else {
        return;
    };
    let Some(current) = rt.display().current_frame(clip) else {
        return;
    };
    let frame = if forward {
        current + 1
    } else {
        current.saturating_sub(1)
    };
    rt.goto_frame(clip, frame, false);
}

fn next_frame(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    step(rt, &call, true);
    Ok(Value::Undefined)
}

fn prev_frame(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    step(rt, &call, false);
    Ok(Value::Undefined)
}

/// Everything is resident, so loaded and total agree.
fn get_bytes(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(clip) = this_clip(rt, &call) else {
        return Ok(Value::Undefined);
    };
    Ok(rt.display().get_property(clip, StandardProperty::TotalFrames))
}

fn create_empty_movie_clip(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(parent) = this_clip(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let depth = rt.to_number_value(&call.arg(1))?;
    let depth = if depth.is_finite() { depth as i32 } else { 0 };
    Ok(Value::Object(rt.new_clip(Some(parent), &name, depth)))
}

fn duplicate_movie_clip(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(source) = this_clip(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let depth = rt.to_number_value(&call.arg(1))?;
    let depth = if depth.is_finite() { depth as i32 } else { 0 };
    Ok(duplicate(rt, source, &name, depth)
        .map(Value::Object)
        .unwrap_or_default())
}

/// Copies `source` into a sibling clip at `depth`, sharing its timeline.
pub(crate) fn duplicate(rt: &mut Runtime, source: ObjectId, name: &str, depth: i32) -> Option<ObjectId> {
    let proto = rt.heap().get(source).and_then(|o| o.proto);
    let clip = rt
        .heap_mut()
        .register(ScriptObject::with_proto(ObjectKind::Clip, proto));
    if !rt.display_mut().duplicate_clip(source, clip, name, depth) {
        return None;
    }
    if let Some(frames) = rt.timelines.get(&source).cloned() {
        rt.timelines.insert(clip, frames);
    }
    Some(clip)
}

/// Takes a clip and its subtree off the stage.
pub(crate) fn remove(rt: &mut Runtime, clip: ObjectId) {
    for removed in rt.display_mut().remove_clip(clip) {
        rt.timelines.shift_remove(&removed);
    }
}

fn remove_movie_clip(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(clip) = this_clip(rt, &call) else {
        return Ok(Value::Undefined);
    };
    if rt.display().parent(clip).is_some() {
        remove(rt, clip);
    }
    Ok(Value::Undefined)
}

fn start_drag(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    if let Some(clip) = this_clip(rt, &call) {
        let lock_center = rt.to_bool(&call.arg(0));
        rt.display_mut().start_drag(clip, lock_center);
    }
    Ok(Value::Undefined)
}

fn stop_drag(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    rt.display_mut().stop_drag();
    Ok(Value::Undefined)
}
