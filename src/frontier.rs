//! The frontier queue: pending requests for a single crawl.
//!
//! The frontier is shared by every worker in a crawl, so it synchronizes
//! internally. It knows nothing about termination; the crawler decides
//! when an empty frontier means the crawl is done.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::navigation::Request;

/// Traversal order for the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// FIFO: explore level by level.
    #[default]
    BreadthFirst,
    /// Deepest-first: follow chains down before widening.
    DepthFirst,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "breadth-first" | "bfs" => Ok(Strategy::BreadthFirst),
            "depth-first" | "dfs" => Ok(Strategy::DepthFirst),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Heap entry for depth-first ordering: deepest wins, ties broken toward
/// the most recently pushed entry.
struct Prioritized {
    depth: usize,
    seq: u64,
    request: Request,
}

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.seq == other.seq
    }
}

impl Eq for Prioritized {}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prioritized {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.depth
            .cmp(&other.depth)
            .then(self.seq.cmp(&other.seq))
    }
}

enum Queue {
    Fifo(VecDeque<Request>),
    Deepest { heap: BinaryHeap<Prioritized>, next_seq: u64 },
}

/// Per-crawl queue of pending navigation requests.
pub struct Frontier {
    inner: Mutex<Queue>,
}

impl Frontier {
    pub fn new(strategy: Strategy) -> Self {
        let queue = match strategy {
            Strategy::BreadthFirst => Queue::Fifo(VecDeque::new()),
            Strategy::DepthFirst => Queue::Deepest {
                heap: BinaryHeap::new(),
                next_seq: 0,
            },
        };
        Frontier {
            inner: Mutex::new(queue),
        }
    }

    pub fn push(&self, request: Request) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Queue::Fifo(queue) => queue.push_back(request),
            Queue::Deepest { heap, next_seq } => {
                let seq = *next_seq;
                *next_seq += 1;
                heap.push(Prioritized {
                    depth: request.depth,
                    seq,
                    request,
                });
            }
        }
    }

    pub fn pop(&self) -> Option<Request> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Queue::Fifo(queue) => queue.pop_front(),
            Queue::Deepest { heap, .. } => heap.pop().map(|entry| entry.request),
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Queue::Fifo(queue) => queue.len(),
            Queue::Deepest { heap, .. } => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_at(url: &str, depth: usize) -> Request {
        Request {
            method: "GET".to_string(),
            url: url.to_string(),
            depth,
            ..Default::default()
        }
    }

    #[test]
    fn test_breadth_first_is_fifo() {
        let frontier = Frontier::new(Strategy::BreadthFirst);
        frontier.push(request_at("http://a.test/", 0));
        frontier.push(request_at("http://a.test/1", 1));
        frontier.push(request_at("http://a.test/2", 1));

        assert_eq!(frontier.pop().unwrap().url, "http://a.test/");
        assert_eq!(frontier.pop().unwrap().url, "http://a.test/1");
        assert_eq!(frontier.pop().unwrap().url, "http://a.test/2");
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_depth_first_pops_deepest() {
        let frontier = Frontier::new(Strategy::DepthFirst);
        frontier.push(request_at("http://a.test/", 0));
        frontier.push(request_at("http://a.test/deep", 3));
        frontier.push(request_at("http://a.test/mid", 1));

        assert_eq!(frontier.pop().unwrap().url, "http://a.test/deep");
        assert_eq!(frontier.pop().unwrap().url, "http://a.test/mid");
        assert_eq!(frontier.pop().unwrap().url, "http://a.test/");
    }

    #[test]
    fn test_depth_first_ties_prefer_most_recent() {
        let frontier = Frontier::new(Strategy::DepthFirst);
        frontier.push(request_at("http://a.test/first", 2));
        frontier.push(request_at("http://a.test/second", 2));

        assert_eq!(frontier.pop().unwrap().url, "http://a.test/second");
        assert_eq!(frontier.pop().unwrap().url, "http://a.test/first");
    }

    #[test]
    fn test_len_tracks_pushes_and_pops() {
        let frontier = Frontier::new(Strategy::BreadthFirst);
        assert!(frontier.is_empty());
        frontier.push(request_at("http://a.test/", 0));
        frontier.push(request_at("http://a.test/x", 1));
        assert_eq!(frontier.len(), 2);
        frontier.pop();
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "breadth-first".parse::<Strategy>().unwrap(),
            Strategy::BreadthFirst
        );
        assert_eq!("dfs".parse::<Strategy>().unwrap(), Strategy::DepthFirst);
        assert!("sideways".parse::<Strategy>().is_err());
    }
}
