use std::sync::Arc;

use crate::models::{Album, Directory, LibraryFile};

/// End of a container the cursor is moved to by `reset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
}

/// What a container groups together
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerKind {
    Directory(Arc<Directory>),
    Album(Arc<Album>),
    Playlist(i32),
}

/// A node of the play queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    File(Arc<LibraryFile>),
    Container(Container),
}

/// An ordered group of queue items with its own cursor.
///
/// `index` points at the active child. A container is valid only while the
/// index is in range and the active child is valid itself, so the cursor of
/// a valid root always ends at a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    kind: ContainerKind,
    index: Option<usize>,
    items: Vec<QueueItem>,
}

impl QueueItem {
    pub fn track(file: Arc<LibraryFile>) -> Self {
        QueueItem::File(file)
    }

    pub fn album(album: Arc<Album>, files: Vec<Arc<LibraryFile>>) -> Self {
        QueueItem::Container(Container::with_files(ContainerKind::Album(album), files))
    }

    pub fn directory(directory: Arc<Directory>, files: Vec<Arc<LibraryFile>>) -> Self {
        QueueItem::Container(Container::with_files(ContainerKind::Directory(directory), files))
    }

    pub fn playlist(id: i32, items: Vec<QueueItem>) -> Self {
        let mut container = Container::new(ContainerKind::Playlist(id));
        for item in items {
            container.add(item);
        }
        QueueItem::Container(container)
    }

    /// Short human readable name
    pub fn label(&self) -> String {
        match self {
            QueueItem::File(file) => file.display_name(),
            QueueItem::Container(container) => container.label(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            QueueItem::File(_) => true,
            QueueItem::Container(container) => container.is_valid(),
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        match self {
            QueueItem::File(_) => &[],
            QueueItem::Container(container) => container.items(),
        }
    }

    pub fn file(&self) -> Option<&Arc<LibraryFile>> {
        match self {
            QueueItem::File(file) => Some(file),
            QueueItem::Container(container) => container.file(),
        }
    }

    fn reset(&mut self, position: Position) {
        if let QueueItem::Container(container) = self {
            container.reset(position);
        }
    }

    fn next(&mut self) -> bool {
        match self {
            QueueItem::File(_) => false,
            QueueItem::Container(container) => container.next(),
        }
    }

    fn prev(&mut self) -> bool {
        match self {
            QueueItem::File(_) => false,
            QueueItem::Container(container) => container.prev(),
        }
    }

    fn collect_path(&self, path: &mut Vec<usize>) {
        if let QueueItem::Container(container) = self {
            container.collect_path(path);
        }
    }

    /// True when `path` walks existing children down to a file
    fn accepts(&self, path: &[usize]) -> bool {
        match (self, path.split_first()) {
            (QueueItem::File(_), None) => true,
            (QueueItem::Container(container), Some((&index, rest))) => container
                .items
                .get(index)
                .map_or(false, |child| child.accepts(rest)),
            _ => false,
        }
    }

    fn apply_path(&mut self, path: &[usize]) {
        if let (QueueItem::Container(container), Some((&index, rest))) = (self, path.split_first()) {
            container.index = Some(index);
            container.items[index].apply_path(rest);
        }
    }
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            index: None,
            items: Vec::new(),
        }
    }

    /// The root of a play queue
    pub fn playlist(id: i32) -> Self {
        Self::new(ContainerKind::Playlist(id))
    }

    fn with_files(kind: ContainerKind, files: Vec<Arc<LibraryFile>>) -> Self {
        Self {
            kind,
            index: None,
            items: files.into_iter().map(QueueItem::File).collect(),
        }
    }

    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    pub fn label(&self) -> String {
        match &self.kind {
            ContainerKind::Directory(directory) => directory.name.clone(),
            ContainerKind::Album(album) => album.name.clone(),
            ContainerKind::Playlist(id) => format!("Playlist {}", id),
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `item`. Empty containers are ignored and `false` is returned.
    /// The cursor is left as it was, an invalid cursor stays invalid.
    pub fn add(&mut self, item: QueueItem) -> bool {
        if let QueueItem::Container(container) = &item {
            if container.is_empty() {
                return false;
            }
        }
        self.items.push(item);
        true
    }

    pub fn is_valid(&self) -> bool {
        self.index
            .and_then(|index| self.items.get(index))
            .map_or(false, QueueItem::is_valid)
    }

    /// Move the cursor to the first or last file. An empty container stays invalid.
    pub fn reset(&mut self, position: Position) {
        if self.items.is_empty() {
            self.index = None;
            return;
        }

        let index = match position {
            Position::First => 0,
            Position::Last => self.items.len() - 1,
        };
        self.index = Some(index);
        self.items[index].reset(position);
    }

    /// Step to the next file in depth-first order.
    /// Returns false without moving at the last file or when invalid.
    pub fn next(&mut self) -> bool {
        if !self.is_valid() {
            return false;
        }
        let Some(index) = self.index else {
            return false;
        };

        if self.items[index].next() {
            return true;
        }
        if index + 1 >= self.items.len() {
            return false;
        }

        self.index = Some(index + 1);
        self.items[index + 1].reset(Position::First);
        true
    }

    /// Step to the previous file in depth-first order.
    /// Returns false without moving at the first file or when invalid.
    pub fn prev(&mut self) -> bool {
        if !self.is_valid() {
            return false;
        }
        let Some(index) = self.index else {
            return false;
        };

        if self.items[index].prev() {
            return true;
        }
        if index == 0 {
            return false;
        }

        self.index = Some(index - 1);
        self.items[index - 1].reset(Position::Last);
        true
    }

    /// Indices from this container down to the current file, empty when invalid
    pub fn path(&self) -> Vec<usize> {
        let mut path = Vec::new();
        if self.is_valid() {
            self.collect_path(&mut path);
        }
        path
    }

    fn collect_path(&self, path: &mut Vec<usize>) {
        if let Some(index) = self.index {
            path.push(index);
            self.items[index].collect_path(path);
        }
    }

    /// Move the cursor to `path`. The path must name a file; otherwise nothing
    /// changes and false is returned.
    pub fn set(&mut self, path: &[usize]) -> bool {
        let Some((&index, rest)) = path.split_first() else {
            return false;
        };
        let accepted = self
            .items
            .get(index)
            .map_or(false, |child| child.accepts(rest));
        if !accepted {
            return false;
        }

        self.index = Some(index);
        self.items[index].apply_path(rest);
        true
    }

    /// The file under the cursor
    pub fn file(&self) -> Option<&Arc<LibraryFile>> {
        if !self.is_valid() {
            return None;
        }
        self.index
            .and_then(|index| self.items.get(index))
            .and_then(QueueItem::file)
    }

    /// Drop every item, the cursor becomes invalid
    pub fn clear(&mut self) {
        self.items.clear();
        self.index = None;
    }

    /// Remove the node at `path` with its descendants.
    ///
    /// Containers emptied by the removal are pruned, this one excepted. When
    /// the active node goes away the cursor moves to the first file of the
    /// node that took its place, or of the next sibling further up. Paths that
    /// do not exist are ignored.
    pub fn remove(&mut self, path: &[usize]) {
        let Some((&index, rest)) = path.split_first() else {
            return;
        };
        if index >= self.items.len() {
            return;
        }

        if rest.is_empty() {
            self.items.remove(index);
            self.child_removed(index);
            return;
        }

        let child = match &mut self.items[index] {
            QueueItem::Container(child) => child,
            // a file has no children
            QueueItem::File(_) => return,
        };
        child.remove(rest);

        if child.is_empty() {
            self.items.remove(index);
            self.child_removed(index);
        } else if self.index == Some(index) && !child.is_valid() {
            self.settle_at(index + 1);
        }
    }

    fn child_removed(&mut self, removed: usize) {
        match self.index {
            Some(active) if removed < active => self.index = Some(active - 1),
            Some(active) if removed == active => self.settle_at(removed),
            _ => {}
        }
    }

    fn settle_at(&mut self, index: usize) {
        if index < self.items.len() {
            self.index = Some(index);
            self.items[index].reset(Position::First);
        } else {
            self.index = None;
        }
    }
}
