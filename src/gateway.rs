use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::post::Post;
use crate::remote;

/// Remote source of feed pages.
///
/// Calls block; the fetch coordinator runs them off the event loop.
pub trait PostFetchGateway: Send + Sync {
    /// Up to `count` posts whose ids are not in `exclude_ids`. Fewer than
    /// `count` only when the corpus is exhausted.
    fn random_posts(&self, count: usize, exclude_ids: &[String]) -> Result<Vec<Post>>;

    /// Offset-paginated posts of one user, newest first.
    fn posts_by_user(
        &self,
        page: usize,
        page_size: usize,
        user_id: &str,
        private_only: Option<bool>,
    ) -> Result<Vec<Post>>;
}

pub struct RemoteGateway {
    client: Arc<remote::Client>,
}

impl RemoteGateway {
    pub fn new(client: Arc<remote::Client>) -> Self {
        Self { client }
    }
}

impl PostFetchGateway for RemoteGateway {
    fn random_posts(&self, count: usize, exclude_ids: &[String]) -> Result<Vec<Post>> {
        self.client
            .random_posts(count, exclude_ids)
            .context("fetch random posts")
    }

    fn posts_by_user(
        &self,
        page: usize,
        page_size: usize,
        user_id: &str,
        private_only: Option<bool>,
    ) -> Result<Vec<Post>> {
        self.client
            .user_posts(page, page_size, user_id, private_only)
            .context("fetch user posts")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Random {
        count: usize,
        exclude_ids: Vec<String>,
    },
    ByUser {
        page: usize,
        page_size: usize,
        user_id: String,
        private_only: Option<bool>,
    },
}

/// In-memory gateway over a fixed corpus.
///
/// Scripted responses, when queued, are served before the corpus. A gate makes
/// every call wait for one message first, which lets callers hold a fetch open.
#[derive(Default)]
pub struct MockGateway {
    corpus: Vec<Post>,
    shuffle: bool,
    scripted: Mutex<VecDeque<std::result::Result<Vec<Post>, String>>>,
    calls: Mutex<Vec<GatewayCall>>,
    gate: Option<Receiver<()>>,
}

impl MockGateway {
    pub fn new(corpus: Vec<Post>) -> Self {
        Self {
            corpus,
            ..Self::default()
        }
    }

    /// Corpus of `count` posts with ids `p1..=p{count}`.
    pub fn with_posts(count: usize) -> Self {
        Self::new(sample_posts(count))
    }

    pub fn shuffled(mut self) -> Self {
        self.shuffle = true;
        self
    }

    pub fn with_gate(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_response(&self, posts: Vec<Post>) {
        self.scripted.lock().push_back(Ok(posts));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.scripted.lock().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn enter(&self, call: GatewayCall) -> Result<Option<Vec<Post>>> {
        self.calls.lock().push(call);
        if let Some(gate) = &self.gate {
            gate.recv()
                .map_err(|_| anyhow!("mock gateway gate closed"))?;
        }
        match self.scripted.lock().pop_front() {
            Some(Ok(posts)) => Ok(Some(posts)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }
}

impl PostFetchGateway for MockGateway {
    fn random_posts(&self, count: usize, exclude_ids: &[String]) -> Result<Vec<Post>> {
        let call = GatewayCall::Random {
            count,
            exclude_ids: exclude_ids.to_vec(),
        };
        if let Some(posts) = self.enter(call)? {
            return Ok(posts);
        }

        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let mut fresh: Vec<Post> = self
            .corpus
            .iter()
            .filter(|post| !excluded.contains(post.id.as_str()))
            .cloned()
            .collect();
        if self.shuffle {
            fresh.shuffle(&mut rand::thread_rng());
        }
        fresh.truncate(count);
        Ok(fresh)
    }

    fn posts_by_user(
        &self,
        page: usize,
        page_size: usize,
        user_id: &str,
        private_only: Option<bool>,
    ) -> Result<Vec<Post>> {
        let call = GatewayCall::ByUser {
            page,
            page_size,
            user_id: user_id.to_string(),
            private_only,
        };
        if let Some(posts) = self.enter(call)? {
            return Ok(posts);
        }

        Ok(self
            .corpus
            .iter()
            .filter(|post| post.owner_id == user_id)
            .filter(|post| private_only.map_or(true, |private| post.private == private))
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect())
    }
}

pub fn sample_posts(count: usize) -> Vec<Post> {
    (1..=count)
        .map(|n| {
            let mut post = Post::new(
                format!("p{n}"),
                format!("Clip #{n}"),
                format!("creator-{}", n % 3),
            );
            post.like_total = (n as u64) * 1_337;
            post.view_total = (n as u64) * 48_211;
            post
        })
        .collect()
}
