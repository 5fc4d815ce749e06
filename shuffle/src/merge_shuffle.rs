//! The `merge_shuffle` module rearranges a linked list into a uniformly
//! random permutation in O(n log n) time and O(log n) auxiliary space.
//!
//! The engine recursively cuts the chain in half, shuffles both halves, and
//! recombines them with a weighted random merge: while both halves have nodes
//! remaining, the next node comes from the left half with probability
//! a / (a + b), where a and b are the remaining counts. Conditioned on both
//! halves being uniform permutations of their own elements, every one of the
//! C(a + b, a) interleavings is equally likely, so the merged chain is a
//! uniform permutation of the union.
//!
//! Three execution policies share this control flow and differ only in how
//! the two half-shuffles are scheduled and where merge randomness comes from;
//! see [`ExecutionPolicy`].

use {
    crate::{
        list::{LinkedList, Node},
        split_rng::SplitRng,
    },
    rand::{Rng, SeedableRng},
    rand_chacha::ChaChaRng,
    rayon::ThreadPool,
    std::sync::{Arc, LazyLock},
    thiserror::Error,
};

/// Sub-chains at or below this many nodes are shuffled on the calling thread
/// by the parallel policies.
pub const DEFAULT_SEQUENTIAL_THRESHOLD: usize = 1024;

// Forking a single node is never worth a task; thresholds are floored here.
const MIN_SEQUENTIAL_THRESHOLD: usize = 2;

static SHUFFLE_THREAD_POOL: LazyLock<ThreadPool> = LazyLock::new(|| {
    rayon::ThreadPoolBuilder::new()
        .num_threads(riffle_rayon_threadlimit::get_thread_count())
        .thread_name(|i| format!("rifShuffle{i:02}"))
        .build()
        .unwrap()
});

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("thread pool build failed: {0}")]
    ThreadPoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Builds a dedicated worker pool of the given width for use with
/// [`ShuffleConfig::with_pool`].
pub fn build_thread_pool(num_threads: usize) -> Result<ThreadPool, ShuffleError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("rifShuffle{i:02}"))
        .build()?;
    Ok(pool)
}

/// How the two recursive half-shuffles are scheduled, and which random source
/// feeds the merge steps.
#[derive(Clone, Debug)]
pub enum ExecutionPolicy {
    /// Both halves on the calling thread, left then right, sharing one
    /// seedable generator. A fixed seed always reproduces the same
    /// permutation; without a seed the generator is drawn from entropy.
    Sequential { seed: Option<u64> },
    /// Fork/join over a worker pool, each merge drawing from a generator
    /// confined to the executing thread. Every run samples the uniform
    /// distribution over permutations, but which permutation comes out
    /// depends on task scheduling and is not reproducible.
    Parallel,
    /// Fork/join over a worker pool with splittable streams: every recursion
    /// level deterministically forks child streams for its halves, so the
    /// output is a pure function of (input, seed) regardless of pool width,
    /// threshold, or scheduling order.
    Deterministic { seed: u64 },
}

/// Tuning and scheduling parameters for [`shuffle`].
#[derive(Clone)]
pub struct ShuffleConfig {
    pub policy: ExecutionPolicy,
    /// Sub-chains at or below this size are shuffled sequentially by the
    /// parallel policies. Values below 2 are clamped.
    pub sequential_threshold: usize,
    /// Worker pool for the parallel policies; `None` uses the shared
    /// process-wide pool.
    pub pool: Option<Arc<ThreadPool>>,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

impl ShuffleConfig {
    pub fn sequential() -> Self {
        Self {
            policy: ExecutionPolicy::Sequential { seed: None },
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            pool: None,
        }
    }

    pub fn sequential_seeded(seed: u64) -> Self {
        Self {
            policy: ExecutionPolicy::Sequential { seed: Some(seed) },
            ..Self::sequential()
        }
    }

    pub fn parallel() -> Self {
        Self {
            policy: ExecutionPolicy::Parallel,
            ..Self::sequential()
        }
    }

    pub fn deterministic(seed: u64) -> Self {
        Self {
            policy: ExecutionPolicy::Deterministic { seed },
            ..Self::sequential()
        }
    }

    pub fn with_sequential_threshold(mut self, sequential_threshold: usize) -> Self {
        self.sequential_threshold = sequential_threshold;
        self
    }

    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Rearranges `list` into a uniformly random permutation of its elements.
///
/// Links are rewritten in place over the same nodes; any previously observed
/// chain order is invalidated. Lists of length 0 or 1 are returned unchanged.
/// The list is sized once by traversal; all recursive work passes sizes down.
pub fn shuffle<T: Send>(list: &mut LinkedList<T>, config: &ShuffleConfig) {
    let n = list.len();
    if n <= 1 {
        return;
    }
    let Some(head) = list.take_head() else {
        return;
    };
    let threshold = clamp_threshold(config.sequential_threshold);
    let head = match &config.policy {
        ExecutionPolicy::Sequential { seed } => {
            let mut rng = match seed {
                Some(seed) => ChaChaRng::seed_from_u64(*seed),
                None => ChaChaRng::from_entropy(),
            };
            shuffle_sequential(head, n, &mut rng)
        }
        ExecutionPolicy::Parallel => with_pool(config.pool.as_deref(), |pool| {
            pool.install(|| shuffle_parallel(head, n, threshold))
        }),
        ExecutionPolicy::Deterministic { seed } => {
            let rng = SplitRng::new(*seed);
            with_pool(config.pool.as_deref(), |pool| {
                pool.install(|| shuffle_deterministic(head, n, threshold, rng))
            })
        }
    };
    list.set_head(head);
}

fn with_pool<R>(pool: Option<&ThreadPool>, f: impl FnOnce(&ThreadPool) -> R) -> R {
    match pool {
        Some(pool) => f(pool),
        None => f(&SHUFFLE_THREAD_POOL),
    }
}

fn clamp_threshold(threshold: usize) -> usize {
    if threshold < MIN_SEQUENTIAL_THRESHOLD {
        warn!("sequential threshold {threshold} clamped to {MIN_SEQUENTIAL_THRESHOLD}");
        MIN_SEQUENTIAL_THRESHOLD
    } else {
        threshold
    }
}

fn shuffle_sequential<T, R: Rng>(mut head: Box<Node<T>>, n: usize, rng: &mut R) -> Box<Node<T>> {
    if n <= 1 {
        return head;
    }
    let left_len = n / 2;
    let right_len = n - left_len;
    let right = split_after(&mut head, left_len);
    let left = shuffle_sequential(head, left_len, rng);
    let right = shuffle_sequential(right, right_len, rng);
    random_merge(left, left_len, right, right_len, rng)
}

fn shuffle_parallel<T: Send>(mut head: Box<Node<T>>, n: usize, threshold: usize) -> Box<Node<T>> {
    if n <= 1 {
        return head;
    }
    if n <= threshold {
        return shuffle_sequential(head, n, &mut rand::thread_rng());
    }
    let left_len = n / 2;
    let right_len = n - left_len;
    let right = split_after(&mut head, left_len);
    // Fork one half onto the pool, shuffle the other on this thread, then
    // block until the forked half is done.
    let (left, right) = rayon::join(
        || shuffle_parallel(head, left_len, threshold),
        || shuffle_parallel(right, right_len, threshold),
    );
    random_merge(left, left_len, right, right_len, &mut rand::thread_rng())
}

fn shuffle_deterministic<T: Send>(
    mut head: Box<Node<T>>,
    n: usize,
    threshold: usize,
    mut rng: SplitRng,
) -> Box<Node<T>> {
    if n <= 1 {
        return head;
    }
    let left_len = n / 2;
    let right_len = n - left_len;
    let right = split_after(&mut head, left_len);
    // Streams fork at every level whether or not a task is forked, so the
    // draw sequence of any sub-chain depends only on its position in the
    // recursion tree, never on which thread runs it.
    let left_rng = rng.split();
    let right_rng = rng.split();
    let (left, right) = if n <= threshold {
        (
            shuffle_deterministic(head, left_len, threshold, left_rng),
            shuffle_deterministic(right, right_len, threshold, right_rng),
        )
    } else {
        rayon::join(
            || shuffle_deterministic(head, left_len, threshold, left_rng),
            || shuffle_deterministic(right, right_len, threshold, right_rng),
        )
    };
    random_merge(left, left_len, right, right_len, &mut rng)
}

// Cuts the chain after its k'th node and returns the tail portion. The two
// chains share no nodes afterwards. Caller guarantees 1 <= k < length.
fn split_after<T>(head: &mut Node<T>, k: usize) -> Box<Node<T>> {
    let mut cur = head;
    for _ in 1..k {
        cur = cur
            .next
            .as_deref_mut()
            .expect("chain ended before split point");
    }
    cur.next.take().expect("chain ended at split point")
}

// Interleaves two shuffled chains into one: while both sides have nodes
// remaining, the next node is drawn from the left side with probability
// la / (la + lb). Once a side runs dry the other side's suffix is linked in
// as is; its relative order is already uniformly random, so no further draws
// are needed.
fn random_merge<T, R: Rng>(
    left: Box<Node<T>>,
    left_len: usize,
    right: Box<Node<T>>,
    right_len: usize,
    rng: &mut R,
) -> Box<Node<T>> {
    let (mut la, mut lb) = (left_len, right_len);
    let (mut left, mut right) = (Some(left), Some(right));
    let mut head = None;
    let mut tail = &mut head;
    while la > 0 && lb > 0 {
        let node = if rng.gen_range(0..la + lb) < la {
            la -= 1;
            let mut node = left.take().expect("left chain ended early");
            left = node.next.take();
            node
        } else {
            lb -= 1;
            let mut node = right.take().expect("right chain ended early");
            right = node.next.take();
            node
        };
        tail = &mut tail.insert(node).next;
    }
    *tail = if la > 0 { left } else { right };
    head.expect("merged chain is empty")
}
