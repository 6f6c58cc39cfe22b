//! The frame tree
//!
//! `FrameLayout` owns every frame in an arena. Tree surgery (insert, cut,
//! delete) keeps sibling and parent links consistent and invalidates what
//! a change makes stale; formatting recomputes only invalid frames.

use crate::{Frame, FrameId, FrameKind, FlowRelationEvent, FlowRelationListener, Insets, LayoutError, Rect, RectFnSet, Result};
use doc_model::{DocumentSettings, NodeId, TextMetrics, Twips};
use std::collections::HashMap;
use std::fmt;

/// Page geometry and layout switches
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub page_width: Twips,
    pub page_height: Twips,
    pub margins: Insets,
    /// Vertical (right to left) text flow
    pub vertical: bool,
    /// A lone page grows with its content
    pub browse_mode: bool,
    pub metrics: TextMetrics,
    /// Fallback step for column balancing
    pub min_balance_step: Twips,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::letter()
    }
}

impl LayoutConfig {
    /// US Letter with one inch margins
    pub fn letter() -> Self {
        Self {
            page_width: 12240,
            page_height: 15840,
            margins: Insets::uniform(1440),
            vertical: false,
            browse_mode: false,
            metrics: TextMetrics::default(),
            min_balance_step: 240,
        }
    }

    /// A4 with 2 cm margins
    pub fn a4() -> Self {
        Self {
            page_width: 11906,
            page_height: 16838,
            margins: Insets::uniform(1134),
            ..Self::letter()
        }
    }

    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            browse_mode: settings.browse_mode,
            metrics: settings.text_metrics,
            min_balance_step: settings.column_balance_quantum,
            ..Self::letter()
        }
    }

    pub fn with_vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }

    pub fn with_browse_mode(mut self, browse: bool) -> Self {
        self.browse_mode = browse;
        self
    }

    pub fn with_page_size(mut self, width: Twips, height: Twips) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    pub fn with_margins(mut self, margins: Insets) -> Self {
        self.margins = margins;
        self
    }

    pub fn fns(&self) -> RectFnSet {
        RectFnSet::new(self.vertical)
    }
}

/// Counters of the work formatting did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatStats {
    pub frames_formatted: usize,
    pub column_passes: usize,
}

/// The layout tree
pub struct FrameLayout {
    frames: Vec<Option<Frame>>,
    free: Vec<usize>,
    root: FrameId,
    pub config: LayoutConfig,
    /// Text, table and section frames by the node they show
    pub(crate) node_frames: HashMap<NodeId, FrameId>,
    listener: Option<Box<dyn FlowRelationListener>>,
    /// Pages whose wrap influence bookkeeping is switched off, with depth
    pub(crate) wrap_influence_off: HashMap<FrameId, usize>,
    pub stats: FormatStats,
}

impl fmt::Debug for FrameLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLayout")
            .field("frames", &self.len())
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FrameLayout {
    /// An empty layout: a root with one page holding an empty body
    pub fn new(config: LayoutConfig) -> Self {
        let mut layout = Self {
            frames: Vec::new(),
            free: Vec::new(),
            root: FrameId(0),
            config,
            node_frames: HashMap::new(),
            listener: None,
            wrap_influence_off: HashMap::new(),
            stats: FormatStats::default(),
        };
        layout.root = layout.alloc(Frame::new(FrameKind::Root));
        let page = layout.new_page();
        // The root has no links and the page is fresh; insertion cannot fail
        if let Err(e) = layout.insert_behind(page, layout.root, None) {
            tracing::error!("failed to attach first page: {}", e);
        }
        layout
    }

    fn new_page(&mut self) -> FrameId {
        let mut page = Frame::new(FrameKind::Page).with_insets(self.config.margins);
        page.area = Rect::new(0, 0, self.config.page_width, self.config.page_height);
        let print = page.print_rect();
        let page = self.alloc(page);

        let mut body = Frame::new(FrameKind::Body);
        body.area = print;
        let body = self.alloc(body);
        if let Err(e) = self.insert_behind(body, page, None) {
            tracing::error!("failed to attach body: {}", e);
        }
        page
    }

    // =========================================================================
    // Arena
    // =========================================================================

    pub(crate) fn alloc(&mut self, frame: Frame) -> FrameId {
        if let Some(index) = self.free.pop() {
            self.frames[index] = Some(frame);
            FrameId(index)
        } else {
            self.frames.push(Some(frame));
            FrameId(self.frames.len() - 1)
        }
    }

    fn release(&mut self, id: FrameId) -> Option<Frame> {
        let frame = self.frames.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(frame)
    }

    pub fn root(&self) -> FrameId {
        self.root
    }

    /// Number of live frames
    pub fn len(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: FrameId) -> bool {
        matches!(self.frames.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: FrameId) -> Result<&Frame> {
        self.frames
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(LayoutError::FrameNotFound(id))
    }

    pub fn get_mut(&mut self, id: FrameId) -> Result<&mut Frame> {
        self.frames
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(LayoutError::FrameNotFound(id))
    }

    pub fn kind(&self, id: FrameId) -> Result<&FrameKind> {
        Ok(&self.get(id)?.kind)
    }

    pub fn upper(&self, id: FrameId) -> Result<Option<FrameId>> {
        Ok(self.get(id)?.upper)
    }

    /// Direct lowers in order
    pub fn lowers(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut out = Vec::new();
        let mut cur = self.get(id)?.first_lower;
        while let Some(c) = cur {
            out.push(c);
            cur = self.get(c)?.next;
        }
        Ok(out)
    }

    /// `id` and everything below it, preorder
    pub fn subtree(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let mut lowers = self.lowers(cur)?;
            lowers.reverse();
            stack.extend(lowers);
        }
        Ok(out)
    }

    /// Nearest upper (not `id` itself) matching `pred`
    pub fn find_upper(&self, id: FrameId, pred: impl Fn(&FrameKind) -> bool) -> Result<Option<FrameId>> {
        let mut cur = self.get(id)?.upper;
        while let Some(u) = cur {
            let frame = self.get(u)?;
            if pred(&frame.kind) {
                return Ok(Some(u));
            }
            cur = frame.upper;
        }
        Ok(None)
    }

    pub fn pages(&self) -> Result<Vec<FrameId>> {
        self.lowers(self.root)
    }

    /// Body of the first page
    pub fn main_body(&self) -> Result<FrameId> {
        let page = self
            .get(self.root)?
            .first_lower
            .ok_or_else(|| LayoutError::BrokenTree("layout has no page".to_string()))?;
        self.body_of(page)
    }

    /// Body lower of a page or column
    pub fn body_of(&self, boss: FrameId) -> Result<FrameId> {
        for lower in self.lowers(boss)? {
            if self.get(lower)?.kind == FrameKind::Body {
                return Ok(lower);
            }
        }
        Err(LayoutError::BrokenTree(format!("{} has no body", boss)))
    }

    /// Frame showing a document node
    pub fn frame_of(&self, node: NodeId) -> Option<FrameId> {
        self.node_frames.get(&node).copied()
    }

    /// Text frames in tree order
    pub fn text_frames(&self) -> Result<Vec<FrameId>> {
        let mut out = Vec::new();
        for id in self.subtree(self.root)? {
            if self.get(id)?.kind.is_text() {
                out.push(id);
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Geometry Shortcuts
    // =========================================================================

    pub fn area(&self, id: FrameId) -> Result<Rect> {
        Ok(self.get(id)?.area)
    }

    pub fn print_rect(&self, id: FrameId) -> Result<Rect> {
        Ok(self.get(id)?.print_rect())
    }

    /// Extent along the variable axis
    pub fn height(&self, id: FrameId) -> Result<Twips> {
        let fns = self.config.fns();
        Ok(fns.height(&self.get(id)?.area))
    }

    pub fn width(&self, id: FrameId) -> Result<Twips> {
        let fns = self.config.fns();
        Ok(fns.width(&self.get(id)?.area))
    }

    pub fn print_height(&self, id: FrameId) -> Result<Twips> {
        let fns = self.config.fns();
        Ok(fns.height(&self.get(id)?.print_rect()))
    }

    pub(crate) fn set_height(&mut self, id: FrameId, height: Twips) -> Result<()> {
        let fns = self.config.fns();
        let frame = self.get_mut(id)?;
        fns.set_height(&mut frame.area, height.max(0));
        Ok(())
    }

    /// Sum of the lower heights of a frame stacking its lowers
    pub fn content_height(&self, id: FrameId) -> Result<Twips> {
        let mut sum = 0;
        for lower in self.lowers(id)? {
            sum += self.height(lower)?;
        }
        Ok(sum)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    fn mark_uppers_dirty(&mut self, id: FrameId) -> Result<()> {
        let mut cur = self.get(id)?.upper;
        while let Some(u) = cur {
            let frame = self.get_mut(u)?;
            if frame.lowers_dirty {
                break;
            }
            frame.lowers_dirty = true;
            cur = frame.upper;
        }
        Ok(())
    }

    pub fn invalidate_size(&mut self, id: FrameId) -> Result<()> {
        self.get_mut(id)?.valid.size = false;
        self.mark_uppers_dirty(id)
    }

    pub fn invalidate_pos(&mut self, id: FrameId) -> Result<()> {
        self.get_mut(id)?.valid.pos = false;
        self.mark_uppers_dirty(id)
    }

    pub fn invalidate_print(&mut self, id: FrameId) -> Result<()> {
        self.get_mut(id)?.valid.print = false;
        self.mark_uppers_dirty(id)
    }

    pub fn invalidate_all(&mut self, id: FrameId) -> Result<()> {
        let frame = self.get_mut(id)?;
        frame.valid = Default::default();
        frame.lowers_dirty = true;
        self.mark_uppers_dirty(id)
    }

    /// Position of the following sibling is stale
    pub fn invalidate_next_pos(&mut self, id: FrameId) -> Result<()> {
        if let Some(next) = self.get(id)?.next {
            self.invalidate_pos(next)?;
        }
        Ok(())
    }

    // =========================================================================
    // Tree Surgery
    // =========================================================================

    fn require_detached(&self, id: FrameId) -> Result<()> {
        if !self.get(id)?.is_detached() {
            return Err(LayoutError::InvalidInsertion(format!("{} is still linked", id)));
        }
        Ok(())
    }

    fn require_lower_of(&self, child: FrameId, parent: FrameId) -> Result<()> {
        if self.get(child)?.upper != Some(parent) {
            return Err(LayoutError::InvalidInsertion(format!(
                "{} is not a lower of {}",
                child, parent
            )));
        }
        Ok(())
    }

    /// Link `id` into `parent` before `before` (at the end when `None`)
    pub fn insert_before(&mut self, id: FrameId, parent: FrameId, before: Option<FrameId>) -> Result<()> {
        self.require_detached(id)?;
        self.get(parent)?;
        if let Some(b) = before {
            self.require_lower_of(b, parent)?;
        }
        self.splice(id, id, parent, before)?;
        self.after_insert(id, id, parent)
    }

    /// Link `id` into `parent` after `after` (as first lower when `None`)
    pub fn insert_behind(&mut self, id: FrameId, parent: FrameId, after: Option<FrameId>) -> Result<()> {
        self.require_detached(id)?;
        let before = match after {
            Some(a) => {
                self.require_lower_of(a, parent)?;
                self.get(a)?.next
            }
            None => self.get(parent)?.first_lower,
        };
        self.splice(id, id, parent, before)?;
        self.after_insert(id, id, parent)
    }

    /// Link a detached chain `first..` (joined through next links) into
    /// `parent` before `before`
    pub fn insert_group_before(&mut self, first: FrameId, parent: FrameId, before: Option<FrameId>) -> Result<()> {
        if self.get(first)?.prev.is_some() {
            return Err(LayoutError::InvalidInsertion(format!("{} is not a chain head", first)));
        }
        let mut last = first;
        loop {
            let frame = self.get(last)?;
            if frame.upper.is_some() {
                return Err(LayoutError::InvalidInsertion(format!("{} already has an upper", last)));
            }
            match frame.next {
                Some(n) => last = n,
                None => break,
            }
        }
        if let Some(b) = before {
            self.require_lower_of(b, parent)?;
        }
        self.splice(first, last, parent, before)?;
        self.after_insert(first, last, parent)
    }

    fn splice(&mut self, first: FrameId, last: FrameId, parent: FrameId, before: Option<FrameId>) -> Result<()> {
        let prev = match before {
            Some(b) => self.get(b)?.prev,
            None => self.get(parent)?.last_lower,
        };
        self.get_mut(first)?.prev = prev;
        self.get_mut(last)?.next = before;
        match prev {
            Some(p) => self.get_mut(p)?.next = Some(first),
            None => self.get_mut(parent)?.first_lower = Some(first),
        }
        match before {
            Some(b) => self.get_mut(b)?.prev = Some(last),
            None => self.get_mut(parent)?.last_lower = Some(last),
        }
        let mut cur = Some(first);
        while let Some(c) = cur {
            self.get_mut(c)?.upper = Some(parent);
            if c == last {
                break;
            }
            cur = self.get(c)?.next;
        }
        Ok(())
    }

    fn after_insert(&mut self, first: FrameId, last: FrameId, parent: FrameId) -> Result<()> {
        let mut cur = Some(first);
        while let Some(c) = cur {
            self.invalidate_all(c)?;
            if c == last {
                break;
            }
            cur = self.get(c)?.next;
        }
        self.invalidate_next_pos(last)?;
        self.invalidate_size(parent)?;
        debug_assert!(self.check_siblings(parent).is_ok());
        Ok(())
    }

    /// Unlink `id` from its upper and siblings; the subtree stays alive
    pub fn remove_from_layout(&mut self, id: FrameId) -> Result<()> {
        let (upper, prev, next) = {
            let frame = self.get(id)?;
            (frame.upper, frame.prev, frame.next)
        };
        let Some(upper) = upper else {
            return Ok(());
        };
        match prev {
            Some(p) => self.get_mut(p)?.next = next,
            None => self.get_mut(upper)?.first_lower = next,
        }
        match next {
            Some(n) => {
                self.get_mut(n)?.prev = prev;
                self.invalidate_pos(n)?;
            }
            None => self.get_mut(upper)?.last_lower = prev,
        }
        let frame = self.get_mut(id)?;
        frame.upper = None;
        frame.prev = None;
        frame.next = None;
        self.invalidate_size(upper)?;
        self.invalidate_print(upper)?;
        Ok(())
    }

    /// Cut `id` out and free its whole subtree
    pub fn delete_frame(&mut self, id: FrameId) -> Result<()> {
        self.remove_from_layout(id)?;
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            stack.extend(self.lowers(cur)?);
            if let Some(frame) = self.release(cur) {
                if let Some(node) = frame.kind.node() {
                    if self.node_frames.get(&node) == Some(&cur) {
                        self.node_frames.remove(&node);
                    }
                }
            }
        }
        Ok(())
    }

    /// Check the sibling chain of `parent`
    pub fn check_siblings(&self, parent: FrameId) -> Result<()> {
        let broken = |msg: String| Err(LayoutError::BrokenTree(msg));
        let frame = self.get(parent)?;
        let mut prev = None;
        let mut cur = frame.first_lower;
        while let Some(c) = cur {
            let lower = self.get(c)?;
            if lower.upper != Some(parent) {
                return broken(format!("{} does not point back to {}", c, parent));
            }
            if lower.prev != prev {
                return broken(format!("{} has a stale prev link", c));
            }
            prev = Some(c);
            cur = lower.next;
        }
        if frame.last_lower != prev {
            return broken(format!("{} has a stale last lower", parent));
        }
        Ok(())
    }

    // =========================================================================
    // Flow Relations
    // =========================================================================

    pub fn set_flow_listener(&mut self, listener: Box<dyn FlowRelationListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_flow_listener(&mut self) {
        self.listener = None;
    }

    pub(crate) fn notify_flow(&mut self, event: FlowRelationEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener.flow_relation_changed(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(layout: &mut FrameLayout) -> FrameId {
        layout.alloc(Frame::new(FrameKind::Text {
            node: NodeId::new(),
            chars: 0,
        }))
    }

    #[test]
    fn test_new_layout_has_page_and_body() {
        let layout = FrameLayout::new(LayoutConfig::letter());
        let pages = layout.pages().unwrap();
        assert_eq!(pages.len(), 1);
        let body = layout.main_body().unwrap();
        assert_eq!(layout.height(body).unwrap(), 15840 - 2 * 1440);
    }

    #[test]
    fn test_insert_and_cut_keep_links() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let body = layout.main_body().unwrap();
        let a = text(&mut layout);
        let b = text(&mut layout);
        let c = text(&mut layout);
        layout.insert_before(a, body, None).unwrap();
        layout.insert_before(c, body, None).unwrap();
        layout.insert_behind(b, body, Some(a)).unwrap();
        assert_eq!(layout.lowers(body).unwrap(), vec![a, b, c]);

        layout.remove_from_layout(b).unwrap();
        assert_eq!(layout.lowers(body).unwrap(), vec![a, c]);
        assert!(layout.get(b).unwrap().is_detached());
        assert!(!layout.get(c).unwrap().valid.pos);
        layout.check_siblings(body).unwrap();
    }

    #[test]
    fn test_insert_linked_frame_is_refused() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let body = layout.main_body().unwrap();
        let a = text(&mut layout);
        layout.insert_before(a, body, None).unwrap();
        assert!(matches!(
            layout.insert_before(a, body, None),
            Err(LayoutError::InvalidInsertion(_))
        ));
    }

    #[test]
    fn test_insert_group_before() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let body = layout.main_body().unwrap();
        let tail = text(&mut layout);
        layout.insert_before(tail, body, None).unwrap();

        let a = text(&mut layout);
        let b = text(&mut layout);
        layout.get_mut(a).unwrap().next = Some(b);
        layout.get_mut(b).unwrap().prev = Some(a);
        layout.insert_group_before(a, body, Some(tail)).unwrap();
        assert_eq!(layout.lowers(body).unwrap(), vec![a, b, tail]);
        assert_eq!(layout.upper(b).unwrap(), Some(body));
    }

    #[test]
    fn test_delete_frees_subtree() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let before = layout.len();
        let body = layout.main_body().unwrap();
        let cell = layout.alloc(Frame::new(FrameKind::Column));
        let inner = text(&mut layout);
        layout.insert_before(inner, cell, None).unwrap();
        layout.insert_before(cell, body, None).unwrap();
        layout.delete_frame(cell).unwrap();
        assert_eq!(layout.len(), before);
        assert!(!layout.contains(inner));
    }
}
