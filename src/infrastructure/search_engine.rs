//! Concurrent tree search
//!
//! A search walks a node and its descendants with a fixed pool of workers.
//! Each work item is a sibling chain: the worker visits every node in the
//! chain, reports matches and pushes the first child of each node as a new
//! item onto a shared stack. Matches are streamed through a bounded channel;
//! dropping the stream cancels whatever work is left.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::dom::{Document, Node, NodeData, NodeId, NodeKind};
use crate::domain::filter::CompiledFilter;
use crate::infrastructure::config::{SearchConfig, TraversalPolicy};

/// Starting point of a sibling chain
#[derive(Debug, Clone, Copy)]
struct WorkItem {
    node: NodeId,
    /// The search root is walked alone, never together with its siblings
    siblings: bool,
}

/// State shared by all workers of one search
struct SearchState {
    id: Uuid,
    document: Arc<Document>,
    filter: Arc<CompiledFilter>,
    traversal: TraversalPolicy,
    stack: Mutex<Vec<WorkItem>>,
    /// Items pushed but not yet fully walked
    pending: AtomicUsize,
    idle: Notify,
    token: CancellationToken,
    visited: AtomicUsize,
    matched: AtomicUsize,
}

impl SearchState {
    fn push(&self, item: WorkItem) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut stack) = self.stack.lock() {
            stack.push(item);
        }
        self.idle.notify_waiters();
    }

    fn pop(&self) -> Option<WorkItem> {
        self.stack.lock().ok().and_then(|mut stack| stack.pop())
    }

    fn finish_item(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn is_candidate(&self, data: &NodeData) -> bool {
        match data.kind {
            NodeKind::Element => true,
            NodeKind::Text => self.traversal == TraversalPolicy::ElementsAndText,
            NodeKind::Document | NodeKind::Doctype | NodeKind::Comment => false,
        }
    }
}

impl Drop for SearchState {
    fn drop(&mut self) {
        debug!(
            search_id = %self.id,
            visited = self.visited.load(Ordering::Relaxed),
            matched = self.matched.load(Ordering::Relaxed),
            cancelled = self.token.is_cancelled(),
            "search finished"
        );
    }
}

/// Spawns searches with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Start searching `root` and its descendants for nodes accepted by `filter`.
    ///
    /// Workers are spawned onto the current Tokio runtime. Matches arrive in no
    /// particular order; the stream ends once the whole subtree was visited.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, e.g. under
    /// `futures::executor::block_on`.
    pub fn search(&self, root: Node, filter: Arc<CompiledFilter>) -> NodeStream {
        let workers = self.config.max_workers.max(1);
        let (sender, receiver) = mpsc::channel(self.config.result_buffer.max(1));
        let token = CancellationToken::new();

        let state = Arc::new(SearchState {
            id: Uuid::new_v4(),
            document: Arc::clone(root.document()),
            filter,
            traversal: self.config.traversal,
            stack: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            token: token.clone(),
            visited: AtomicUsize::new(0),
            matched: AtomicUsize::new(0),
        });

        debug!(
            search_id = %state.id,
            root = ?root,
            workers,
            criteria = state.filter.criteria().len(),
            "search started"
        );

        state.push(WorkItem {
            node: root.id(),
            siblings: false,
        });

        for worker_id in 0..workers {
            tokio::spawn(run_worker(worker_id, Arc::clone(&state), sender.clone()));
        }

        NodeStream {
            search_id: state.id,
            inner: ReceiverStream::new(receiver),
            token: token.clone(),
            _guard: token.drop_guard(),
        }
    }
}

async fn run_worker(worker_id: usize, state: Arc<SearchState>, results: mpsc::Sender<Node>) {
    trace!(search_id = %state.id, worker_id, "worker started");

    loop {
        // Register interest before checking the stack so a push between the
        // check and the wait is not missed.
        let notified = state.idle.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if state.token.is_cancelled() {
            break;
        }

        match state.pop() {
            Some(item) => {
                let completed = walk_chain(&state, item, &results).await;
                state.finish_item();
                if !completed {
                    break;
                }
            }
            None => {
                if state.pending.load(Ordering::Acquire) == 0 {
                    break;
                }
                tokio::select! {
                    () = &mut notified => {}
                    () = state.token.cancelled() => break,
                }
            }
        }
    }

    trace!(search_id = %state.id, worker_id, "worker stopped");
}

/// Visit one sibling chain; false if the search was cancelled meanwhile
async fn walk_chain(state: &SearchState, item: WorkItem, results: &mpsc::Sender<Node>) -> bool {
    let mut current = Some(item.node);

    while let Some(id) = current {
        if state.token.is_cancelled() {
            return false;
        }

        let data = state.document.get(id);
        state.visited.fetch_add(1, Ordering::Relaxed);

        if state.is_candidate(data) && state.filter.matches(data) {
            state.matched.fetch_add(1, Ordering::Relaxed);
            trace!(search_id = %state.id, node = id.index(), tag = %data.data, "match");

            let node = Node::new(Arc::clone(&state.document), id);
            tokio::select! {
                biased;
                () = state.token.cancelled() => return false,
                sent = results.send(node) => {
                    if sent.is_err() {
                        state.token.cancel();
                        return false;
                    }
                }
            }
        }

        if let Some(child) = data.first_child {
            state.push(WorkItem {
                node: child,
                siblings: true,
            });
        }

        current = if item.siblings { data.next_sibling } else { None };
    }

    true
}

/// Stream of matches from one search
///
/// Dropping the stream cancels the search.
pub struct NodeStream {
    search_id: Uuid,
    inner: ReceiverStream<Node>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl NodeStream {
    /// Stop all workers; matches already buffered are still delivered
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observing this search's cancellation
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn search_id(&self) -> Uuid {
        self.search_id
    }
}

impl Stream for NodeStream {
    type Item = Node;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for NodeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStream")
            .field("search_id", &self.search_id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::Filter;
    use futures::StreamExt;
    use std::time::Duration;

    const PAGE: &str = r#"<html><head><title>t</title></head><body>
        <ul id="menu"><li class="a">one</li><li class="b">two</li><li class="a b">three</li></ul>
        <!-- note -->
        <p>text <b>bold</b></p>
    </body></html>"#;

    fn document(html: &str) -> Arc<Document> {
        Arc::new(Document::parse(html))
    }

    fn count_nodes(root: &Node, keep: &dyn Fn(&Node) -> bool) -> usize {
        let mut stack = vec![root.clone()];
        let mut count = 0;
        while let Some(node) = stack.pop() {
            if keep(&node) {
                count += 1;
            }
            stack.extend(node.children());
        }
        count
    }

    async fn collect(engine: &SearchEngine, root: Node, filter: Filter) -> Vec<Node> {
        engine.search(root, filter.compile()).collect().await
    }

    #[tokio::test]
    async fn test_pass_through_returns_every_element() {
        let doc = document(PAGE);
        let expected = count_nodes(&doc.root(), &|node| node.is_element());
        let found = collect(&SearchEngine::default(), doc.root(), Filter::new()).await;
        assert_eq!(found.len(), expected);
        assert!(found.iter().all(Node::is_element));
    }

    #[tokio::test]
    async fn test_tag_filter_returns_exact_tag() {
        let doc = document(PAGE);
        let found = collect(&SearchEngine::default(), doc.root(), Filter::with_tag("li")).await;
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|node| node.value() == "li"));
    }

    #[tokio::test]
    async fn test_text_nodes_follow_traversal_policy() {
        let doc = document(PAGE);
        let elements_only = collect(&SearchEngine::default(), doc.root(), Filter::new()).await;
        assert!(!elements_only.iter().any(Node::is_text));

        let engine = SearchEngine::new(SearchConfig {
            traversal: TraversalPolicy::ElementsAndText,
            ..Default::default()
        });
        let with_text = collect(&engine, doc.root(), Filter::new()).await;
        let expected = count_nodes(&doc.root(), &|node| node.is_element() || node.is_text());
        assert_eq!(with_text.len(), expected);
        assert!(with_text.iter().any(|node| node.is_text() && node.value() == "one"));
    }

    #[tokio::test]
    async fn test_search_never_leaves_root_subtree() {
        let doc = document(PAGE);
        let first_li = collect(&SearchEngine::default(), doc.root(), Filter::with_tag("li"))
            .await
            .into_iter()
            .find(|node| node.attr("class") == Some("a"))
            .unwrap();

        let found = collect(&SearchEngine::default(), first_li.clone(), Filter::with_tag("li")).await;
        assert_eq!(found, vec![first_li]);
    }

    #[tokio::test]
    async fn test_single_worker_matches_pool() {
        let doc = document(PAGE);
        let engine = SearchEngine::new(SearchConfig {
            max_workers: 1,
            result_buffer: 1,
            ..Default::default()
        });
        let filter = Filter::new().attribute("class", "a");
        let found = collect(&engine, doc.root(), filter).await;
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_search() {
        let items: String = (0..500).map(|i| format!("<div>{i}</div>")).collect();
        let doc = document(&format!("<html><body>{items}</body></html>"));
        let engine = SearchEngine::new(SearchConfig {
            result_buffer: 1,
            ..Default::default()
        });

        let mut stream = engine.search(doc.root(), Filter::with_tag("div").compile());
        let token = stream.cancellation_token();
        assert!(stream.next().await.is_some());
        drop(stream);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let items: String = (0..500).map(|i| format!("<div>{i}</div>")).collect();
        let doc = document(&format!("<html><body>{items}</body></html>"));
        let engine = SearchEngine::new(SearchConfig {
            result_buffer: 1,
            ..Default::default()
        });

        let mut stream = engine.search(doc.root(), Filter::with_tag("div").compile());
        assert!(stream.next().await.is_some());
        stream.cancel();
        assert!(stream.is_cancelled());

        let rest = tokio::time::timeout(Duration::from_secs(5), stream.count())
            .await
            .expect("stream should end after cancel");
        assert!(rest < 499);
    }

    #[tokio::test]
    async fn test_placeholder_yields_nothing() {
        let doc = Arc::new(Document::placeholder());
        let found = collect(&SearchEngine::default(), doc.root(), Filter::new()).await;
        assert!(found.is_empty());
    }
}
