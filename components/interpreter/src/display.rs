//! Display collaborator surface.
//!
//! The runtime never owns display state. A clip is a heap object of kind
//! `Clip`; its position in the tree, its frame counter and its standard
//! properties live behind the [`DisplayHost`] trait, keyed by the clip's
//! [`ObjectId`]. [`Stage`] is the in-memory implementation used by the
//! player and by tests.

use core_types::{format_number, ObjectId, ScriptVersion, Value};
use indexmap::IndexMap;
use std::fmt;

/// The well-known clip properties addressable by index from AVM1.
///
/// # Examples
///
/// ```
/// use interpreter::StandardProperty;
///
/// assert_eq!(StandardProperty::from_index(6), Some(StandardProperty::Alpha));
/// assert_eq!(StandardProperty::from_name("_ALPHA"), Some(StandardProperty::Alpha));
/// assert_eq!(StandardProperty::Alpha.name(), "_alpha");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StandardProperty {
    X,
    Y,
    XScale,
    YScale,
    CurrentFrame,
    TotalFrames,
    Alpha,
    Visible,
    Width,
    Height,
    Rotation,
    Target,
    FramesLoaded,
    Name,
    DropTarget,
    Url,
    HighQuality,
    FocusRect,
    SoundBufTime,
    Quality,
    XMouse,
    YMouse,
}

const PROPERTY_TABLE: [(StandardProperty, &str); 22] = [
    (StandardProperty::X, "_x"),
    (StandardProperty::Y, "_y"),
    (StandardProperty::XScale, "_xscale"),
    (StandardProperty::YScale, "_yscale"),
    (StandardProperty::CurrentFrame, "_currentframe"),
    (StandardProperty::TotalFrames, "_totalframes"),
    (StandardProperty::Alpha, "_alpha"),
    (StandardProperty::Visible, "_visible"),
    (StandardProperty::Width, "_width"),
    (StandardProperty::Height, "_height"),
    (StandardProperty::Rotation, "_rotation"),
    (StandardProperty::Target, "_target"),
    (StandardProperty::FramesLoaded, "_framesloaded"),
    (StandardProperty::Name, "_name"),
    (StandardProperty::DropTarget, "_droptarget"),
    (StandardProperty::Url, "_url"),
    (StandardProperty::HighQuality, "_highquality"),
    (StandardProperty::FocusRect, "_focusrect"),
    (StandardProperty::SoundBufTime, "_soundbuftime"),
    (StandardProperty::Quality, "_quality"),
    (StandardProperty::XMouse, "_xmouse"),
    (StandardProperty::YMouse, "_ymouse"),
];

impl StandardProperty {
    /// Property for a `GetProperty`/`SetProperty` index.
    pub fn from_index(index: usize) -> Option<StandardProperty> {
        PROPERTY_TABLE.get(index).map(|(prop, _)| *prop)
    }

    /// Property for a member name, case-insensitive.
    pub fn from_name(name: &str) -> Option<StandardProperty> {
        if !name.starts_with('_') {
            return None;
        }
        PROPERTY_TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(prop, _)| *prop)
    }

    /// Script-visible name.
    pub fn name(self) -> &'static str {
        PROPERTY_TABLE
            .iter()
            .find(|(prop, _)| *prop == self)
            .map(|(_, n)| *n)
            .unwrap_or("")
    }

    /// Scripts cannot assign it.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            StandardProperty::CurrentFrame
                | StandardProperty::TotalFrames
                | StandardProperty::Target
                | StandardProperty::FramesLoaded
                | StandardProperty::DropTarget
                | StandardProperty::Url
                | StandardProperty::XMouse
                | StandardProperty::YMouse
        )
    }
}

/// One visible clip as handed to a [`RenderSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    /// The clip
    pub clip: ObjectId,
    /// Slash path, `/` for the root
    pub path: String,
    /// Depth within its parent
    pub depth: i32,
    /// Stage-space x
    pub x: f64,
    /// Stage-space y
    pub y: f64,
    /// Accumulated horizontal scale, percent
    pub xscale: f64,
    /// Accumulated vertical scale, percent
    pub yscale: f64,
    /// Local rotation in degrees
    pub rotation: f64,
    /// Accumulated alpha, percent
    pub alpha: f64,
    /// Zero-based current frame
    pub frame: u32,
}

/// Receives the flattened display list.
pub trait RenderSink {
    /// Called before the first item.
    fn begin_frame(&mut self, _width: f64, _height: f64) {}

    /// One visible clip, parents before children.
    fn draw_clip(&mut self, item: &DisplayItem);

    /// Called after the last item.
    fn end_frame(&mut self) {}
}

impl RenderSink for Vec<DisplayItem> {
    fn draw_clip(&mut self, item: &DisplayItem) {
        self.push(item.clone());
    }
}

/// Callback surface between the runtime and the display tree.
pub trait DisplayHost: fmt::Debug + Send {
    /// The root clip, once created.
    fn root(&self) -> Option<ObjectId>;

    /// Inserts a clip under `parent` (or as the root when `None`).
    fn add_clip(&mut self, clip: ObjectId, parent: Option<ObjectId>, name: &str, depth: i32);

    /// Removes a clip and its subtree. Returns every removed clip.
    fn remove_clip(&mut self, clip: ObjectId) -> Vec<ObjectId>;

    /// Copies `source`'s properties into a new sibling.
    fn duplicate_clip(&mut self, source: ObjectId, clip: ObjectId, name: &str, depth: i32) -> bool;

    /// The clip is on the stage.
    fn contains(&self, clip: ObjectId) -> bool;

    /// Parent clip.
    fn parent(&self, clip: ObjectId) -> Option<ObjectId>;

    /// Named child, case-insensitive.
    fn child_by_name(&self, parent: ObjectId, name: &str) -> Option<ObjectId>;

    /// Children in depth order.
    fn children(&self, clip: ObjectId) -> Vec<ObjectId>;

    /// Every clip on the stage, root first.
    fn clips(&self) -> Vec<ObjectId>;

    /// Reads a standard property. Unknown clips read as undefined.
    fn get_property(&self, clip: ObjectId, prop: StandardProperty) -> Value;

    /// Writes a standard property. Returns false for read-only properties
    /// and unknown clips.
    fn set_property(&mut self, clip: ObjectId, prop: StandardProperty, value: &Value) -> bool;

    /// Declares the number of frames in a clip's timeline.
    fn set_frame_count(&mut self, clip: ObjectId, frames: u32);

    /// Names a frame for `gotoAndPlay("label")`.
    fn add_frame_label(&mut self, clip: ObjectId, label: &str, frame: u32);

    /// Zero-based current frame.
    fn current_frame(&self, clip: ObjectId) -> Option<u32>;

    /// Moves the playhead (zero-based, clamped). Returns whether the frame
    /// changed.
    fn goto_frame(&mut self, clip: ObjectId, frame: u32, play: bool) -> bool;

    /// Moves the playhead to a labelled frame.
    fn goto_label(&mut self, clip: ObjectId, label: &str, play: bool) -> bool;

    /// Starts or stops the playhead.
    fn set_playing(&mut self, clip: ObjectId, playing: bool);

    /// Steps every playing clip by one frame. Returns the clips whose frame
    /// changed, in tree order.
    fn advance(&mut self) -> Vec<ObjectId>;

    /// Starts dragging a clip with the mouse.
    fn start_drag(&mut self, clip: ObjectId, lock_center: bool);

    /// Ends any drag.
    fn stop_drag(&mut self);

    /// Walks visible clips into `sink`.
    fn render(&self, sink: &mut dyn RenderSink);

    /// Slash path: `/`, `/a`, `/a/b`.
    fn target_path(&self, clip: ObjectId) -> String {
        let mut names = Vec::new();
        let mut next = Some(clip);
        while let Some(id) = next {
            let parent = self.parent(id);
            if parent.is_some() {
                names.push(self.get_property(id, StandardProperty::Name).to_string());
            }
            next = parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Dot path: `_level0`, `_level0.a.b`.
    fn dot_path(&self, clip: ObjectId) -> String {
        let slash = self.target_path(clip);
        let rest = slash.trim_start_matches('/');
        if rest.is_empty() {
            "_level0".to_string()
        } else {
            format!("_level0.{}", rest.replace('/', "."))
        }
    }
}

#[derive(Debug, Clone)]
struct ClipNode {
    name: String,
    parent: Option<ObjectId>,
    depth: i32,
    children: Vec<ObjectId>,
    x: f64,
    y: f64,
    xscale: f64,
    yscale: f64,
    rotation: f64,
    alpha: f64,
    visible: bool,
    width: f64,
    height: f64,
    current_frame: u32,
    total_frames: u32,
    playing: bool,
    labels: IndexMap<String, u32>,
}

impl ClipNode {
    fn new(name: &str, parent: Option<ObjectId>, depth: i32) -> Self {
        ClipNode {
            name: name.to_string(),
            parent,
            depth,
            children: Vec::new(),
            x: 0.0,
            y: 0.0,
            xscale: 100.0,
            yscale: 100.0,
            rotation: 0.0,
            alpha: 100.0,
            visible: true,
            width: 0.0,
            height: 0.0,
            current_frame: 0,
            total_frames: 1,
            playing: true,
            labels: IndexMap::new(),
        }
    }
}

/// In-memory display tree.
///
/// # Examples
///
/// ```
/// use interpreter::{DisplayHost, Stage, StandardProperty};
/// use core_types::{ObjectId, Value};
///
/// let root = ObjectId::new(0, 0);
/// let child = ObjectId::new(1, 0);
/// let mut stage = Stage::new(550.0, 400.0);
/// stage.add_clip(root, None, "_level0", 0);
/// stage.add_clip(child, Some(root), "ball", 1);
///
/// stage.set_property(child, StandardProperty::X, &Value::Number(20.0));
/// assert_eq!(stage.get_property(child, StandardProperty::X), Value::Number(20.0));
/// assert_eq!(stage.target_path(child), "/ball");
/// assert_eq!(stage.child_by_name(root, "BALL"), Some(child));
/// ```
#[derive(Debug, Default)]
pub struct Stage {
    clips: IndexMap<ObjectId, ClipNode>,
    root: Option<ObjectId>,
    width: f64,
    height: f64,
    dragging: Option<ObjectId>,
    mouse: (f64, f64),
    quality: String,
    focus_rect: bool,
    sound_buf_time: f64,
}

impl Stage {
    /// An empty stage of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Stage {
            width,
            height,
            quality: "HIGH".to_string(),
            focus_rect: true,
            sound_buf_time: 5.0,
            ..Stage::default()
        }
    }

    /// Moves the mouse; a dragged clip follows it.
    pub fn set_mouse(&mut self, x: f64, y: f64) {
        self.mouse = (x, y);
        if let Some(node) = self.dragging.and_then(|id| self.clips.get_mut(&id)) {
            node.x = x;
            node.y = y;
        }
    }

    /// Clip being dragged.
    pub fn dragging(&self) -> Option<ObjectId> {
        self.dragging
    }

    fn sort_children(&mut self, parent: ObjectId) {
        let mut children = match self.clips.get(&parent) {
            Some(node) => node.children.clone(),
            None => return,
        };
        children.sort_by_key(|c| self.clips.get(c).map(|n| n.depth).unwrap_or(0));
        if let Some(node) = self.clips.get_mut(&parent) {
            node.children = children;
        }
    }

    fn local_mouse(&self, clip: ObjectId) -> (f64, f64) {
        let mut x = self.mouse.0;
        let mut y = self.mouse.1;
        let mut next = Some(clip);
        while let Some(id) = next {
            let Some(node) = self.clips.get(&id) else {
                break;
            };
            x -= node.x;
            y -= node.y;
            next = node.parent;
        }
        (x, y)
    }

    fn render_clip(
        &self,
        clip: ObjectId,
        origin: (f64, f64),
        scale: (f64, f64),
        alpha: f64,
        sink: &mut dyn RenderSink,
    ) {
        let Some(node) = self.clips.get(&clip) else {
            return;
        };
        if !node.visible {
            return;
        }
        let x = origin.0 + node.x * scale.0 / 100.0;
        let y = origin.1 + node.y * scale.1 / 100.0;
        let xscale = scale.0 * node.xscale / 100.0;
        let yscale = scale.1 * node.yscale / 100.0;
        let alpha = alpha * node.alpha / 100.0;
        sink.draw_clip(&DisplayItem {
            clip,
            path: self.target_path(clip),
            depth: node.depth,
            x,
            y,
            xscale,
            yscale,
            rotation: node.rotation,
            alpha,
            frame: node.current_frame,
        });
        for child in &node.children {
            self.render_clip(*child, (x, y), (xscale, yscale), alpha, sink);
        }
    }
}

impl DisplayHost for Stage {
    fn root(&self) -> Option<ObjectId> {
        self.root
    }

    fn add_clip(&mut self, clip: ObjectId, parent: Option<ObjectId>, name: &str, depth: i32) {
        let parent = parent.filter(|p| self.clips.contains_key(p));
        if let Some(p) = parent {
            // A new clip replaces whatever occupied its depth.
            let occupant = self.clips.get(&p).and_then(|node| {
                node.children
                    .iter()
                    .copied()
                    .find(|c| self.clips.get(c).map(|n| n.depth) == Some(depth))
            });
            if let Some(old) = occupant {
                self.remove_clip(old);
            }
        }
        self.clips.insert(clip, ClipNode::new(name, parent, depth));
        match parent {
            Some(p) => {
                if let Some(node) = self.clips.get_mut(&p) {
                    node.children.push(clip);
                }
                self.sort_children(p);
            }
            None => self.root = Some(clip),
        }
    }

    fn remove_clip(&mut self, clip: ObjectId) -> Vec<ObjectId> {
        let mut removed = Vec::new();
        let mut work = vec![clip];
        while let Some(id) = work.pop() {
            if let Some(node) = self.clips.shift_remove(&id) {
                work.extend(node.children.iter().copied());
                removed.push(id);
            }
        }
        for node in self.clips.values_mut() {
            node.children.retain(|c| !removed.contains(c));
        }
        if self.root.is_some_and(|r| removed.contains(&r)) {
            self.root = None;
        }
        if self.dragging.is_some_and(|d| removed.contains(&d)) {
            self.dragging = None;
        }
        removed
    }

    fn duplicate_clip(&mut self, source: ObjectId, clip: ObjectId, name: &str, depth: i32) -> bool {
        let Some(template) = self.clips.get(&source).cloned() else {
            return false;
        };
        let Some(parent) = template.parent else {
            return false;
        };
        self.add_clip(clip, Some(parent), name, depth);
        if let Some(node) = self.clips.get_mut(&clip) {
            node.x = template.x;
            node.y = template.y;
            node.xscale = template.xscale;
            node.yscale = template.yscale;
            node.rotation = template.rotation;
            node.alpha = template.alpha;
            node.visible = template.visible;
            node.width = template.width;
            node.height = template.height;
            node.total_frames = template.total_frames;
            node.labels = template.labels;
        }
        true
    }

    fn contains(&self, clip: ObjectId) -> bool {
        self.clips.contains_key(&clip)
    }

    fn parent(&self, clip: ObjectId) -> Option<ObjectId> {
        self.clips.get(&clip)?.parent
    }

    fn child_by_name(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.clips.get(&parent)?.children.iter().copied().find(|c| {
            self.clips
                .get(c)
                .is_some_and(|n| n.name.eq_ignore_ascii_case(name))
        })
    }

    fn children(&self, clip: ObjectId) -> Vec<ObjectId> {
        self.clips
            .get(&clip)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn clips(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut work: Vec<ObjectId> = self.root.into_iter().collect();
        while let Some(id) = work.pop() {
            out.push(id);
            let children = self.children(id);
            work.extend(children.into_iter().rev());
        }
        out
    }

    fn get_property(&self, clip: ObjectId, prop: StandardProperty) -> Value {
        let Some(node) = self.clips.get(&clip) else {
            return Value::Undefined;
        };
        match prop {
            StandardProperty::X => Value::Number(node.x),
            StandardProperty::Y => Value::Number(node.y),
            StandardProperty::XScale => Value::Number(node.xscale),
            StandardProperty::YScale => Value::Number(node.yscale),
            StandardProperty::CurrentFrame => Value::Number(f64::from(node.current_frame + 1)),
            StandardProperty::TotalFrames | StandardProperty::FramesLoaded => {
                Value::Number(f64::from(node.total_frames))
            }
            StandardProperty::Alpha => Value::Number(node.alpha),
            StandardProperty::Visible => Value::Boolean(node.visible),
            StandardProperty::Width => Value::Number(node.width),
            StandardProperty::Height => Value::Number(node.height),
            StandardProperty::Rotation => Value::Number(node.rotation),
            StandardProperty::Target => Value::String(self.target_path(clip)),
            StandardProperty::Name => Value::String(node.name.clone()),
            StandardProperty::DropTarget => Value::String(String::new()),
            StandardProperty::Url => Value::String(String::new()),
            StandardProperty::HighQuality => Value::Number(if self.quality == "LOW" { 0.0 } else { 1.0 }),
            StandardProperty::FocusRect => Value::Boolean(self.focus_rect),
            StandardProperty::SoundBufTime => Value::Number(self.sound_buf_time),
            StandardProperty::Quality => Value::String(self.quality.clone()),
            StandardProperty::XMouse => Value::Number(self.local_mouse(clip).0),
            StandardProperty::YMouse => Value::Number(self.local_mouse(clip).1),
        }
    }

    fn set_property(&mut self, clip: ObjectId, prop: StandardProperty, value: &Value) -> bool {
        if prop.is_read_only() {
            return false;
        }
        match prop {
            StandardProperty::HighQuality => {
                self.quality = if value.to_number() == 0.0 { "LOW" } else { "HIGH" }.to_string();
                return true;
            }
            StandardProperty::FocusRect => {
                self.focus_rect = value.to_bool(ScriptVersion::DEFAULT);
                return true;
            }
            StandardProperty::SoundBufTime => {
                self.sound_buf_time = value.to_number();
                return true;
            }
            StandardProperty::Quality => {
                self.quality = value.to_string().to_ascii_uppercase();
                return true;
            }
            _ => {}
        }
        let Some(node) = self.clips.get_mut(&clip) else {
            return false;
        };
        let n = value.to_number();
        // NaN assignments to numeric properties are ignored.
        let numeric = |slot: &mut f64| {
            if !n.is_nan() {
                *slot = n;
            }
        };
        match prop {
            StandardProperty::X => numeric(&mut node.x),
            StandardProperty::Y => numeric(&mut node.y),
            StandardProperty::XScale => numeric(&mut node.xscale),
            StandardProperty::YScale => numeric(&mut node.yscale),
            StandardProperty::Alpha => numeric(&mut node.alpha),
            StandardProperty::Width => numeric(&mut node.width),
            StandardProperty::Height => numeric(&mut node.height),
            StandardProperty::Rotation => {
                if !n.is_nan() {
                    let mut r = n % 360.0;
                    if r > 180.0 {
                        r -= 360.0;
                    } else if r < -180.0 {
                        r += 360.0;
                    }
                    node.rotation = r;
                }
            }
            StandardProperty::Visible => node.visible = value.to_bool(ScriptVersion::DEFAULT),
            StandardProperty::Name => node.name = value.to_string(),
            _ => return false,
        }
        true
    }

    fn set_frame_count(&mut self, clip: ObjectId, frames: u32) {
        if let Some(node) = self.clips.get_mut(&clip) {
            node.total_frames = frames.max(1);
            node.current_frame = node.current_frame.min(node.total_frames - 1);
        }
    }

    fn add_frame_label(&mut self, clip: ObjectId, label: &str, frame: u32) {
        if let Some(node) = self.clips.get_mut(&clip) {
            node.labels.insert(label.to_ascii_lowercase(), frame);
        }
    }

    fn current_frame(&self, clip: ObjectId) -> Option<u32> {
        self.clips.get(&clip).map(|n| n.current_frame)
    }

    fn goto_frame(&mut self, clip: ObjectId, frame: u32, play: bool) -> bool {
        let Some(node) = self.clips.get_mut(&clip) else {
            return false;
        };
        let target = frame.min(node.total_frames.saturating_sub(1));
        let changed = target != node.current_frame;
        node.current_frame = target;
        node.playing = play;
        changed
    }

    fn goto_label(&mut self, clip: ObjectId, label: &str, play: bool) -> bool {
        let frame = self
            .clips
            .get(&clip)
            .and_then(|n| n.labels.get(&label.to_ascii_lowercase()).copied());
        match frame {
            Some(frame) => self.goto_frame(clip, frame, play),
            None => false,
        }
    }

    fn set_playing(&mut self, clip: ObjectId, playing: bool) {
        if let Some(node) = self.clips.get_mut(&clip) {
            node.playing = playing;
        }
    }

    fn advance(&mut self) -> Vec<ObjectId> {
        let mut changed = Vec::new();
        for id in self.clips() {
            let Some(node) = self.clips.get_mut(&id) else {
                continue;
            };
            if !node.playing || node.total_frames <= 1 {
                continue;
            }
            node.current_frame = (node.current_frame + 1) % node.total_frames;
            changed.push(id);
        }
        changed
    }

    fn start_drag(&mut self, clip: ObjectId, lock_center: bool) {
        if !self.clips.contains_key(&clip) {
            return;
        }
        self.dragging = Some(clip);
        if lock_center {
            let (x, y) = self.mouse;
            self.set_mouse(x, y);
        }
    }

    fn stop_drag(&mut self) {
        self.dragging = None;
    }

    fn render(&self, sink: &mut dyn RenderSink) {
        sink.begin_frame(self.width, self.height);
        if let Some(root) = self.root {
            self.render_clip(root, (0.0, 0.0), (100.0, 100.0), 100.0, sink);
        }
        sink.end_frame();
    }
}

impl fmt::Display for DisplayItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} depth={} x={} y={} alpha={} frame={}",
            self.path,
            self.depth,
            format_number(self.x),
            format_number(self.y),
            format_number(self.alpha),
            self.frame + 1
        )
    }
}
