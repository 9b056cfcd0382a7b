//! Multi-threaded graph player.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::error::GraphError;
use crate::node::NodeRef;
use crate::play_head::PlayHeadState;
use crate::player::{Player, prepare_tree};
use crate::pool::{Job, WorkerPool};
use crate::time::SampleRange;

// Dependency structure of the tree, fixed at prepare time.
struct Topology {
    // Post order; indices below refer into this list.
    nodes: Vec<NodeRef>,
    dependents: Vec<Vec<usize>>,
    input_counts: Vec<usize>,
}

// Shared state for one in-flight block.
struct Epoch {
    topology: Arc<Topology>,
    remaining: Vec<AtomicUsize>,
    pending: AtomicUsize,
    failed: AtomicBool,
    error: Mutex<Option<GraphError>>,
    done: Sender<()>,
    jobs: Sender<Job>,
    range: SampleRange,
    state: PlayHeadState,
}

/// Processes the tree on a [`WorkerPool`], dispatching each node as soon
/// as its inputs complete.
///
/// A node's own mixing order is sequential inside its `process` call, so
/// the output is bit-identical to [`crate::player::SingleThreadedPlayer`].
/// With zero or one workers the player degrades to an in-place
/// sequential sweep over the post-order list.
pub struct MultiThreadedPlayer {
    root: NodeRef,
    pool: WorkerPool,
    topology: Option<Arc<Topology>>,
}

impl MultiThreadedPlayer {
    /// A player over `root` using an existing pool.
    pub fn new(root: NodeRef, pool: WorkerPool) -> Self {
        Self {
            root,
            pool,
            topology: None,
        }
    }

    /// A player over `root` with its own pool of `num_workers` threads.
    pub fn with_workers(root: NodeRef, num_workers: usize) -> Self {
        Self::new(root, WorkerPool::new(num_workers))
    }

    fn build_topology(nodes: Vec<NodeRef>) -> Topology {
        let index_of: HashMap<*const _, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (Arc::as_ptr(node), i))
            .collect();
        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut input_counts = vec![0usize; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for input in node.direct_inputs() {
                let j = index_of[&Arc::as_ptr(&input)];
                dependents[j].push(i);
                input_counts[i] += 1;
            }
        }
        Topology {
            nodes,
            dependents,
            input_counts,
        }
    }

    fn process_sequential(
        &self,
        topology: &Topology,
        range: SampleRange,
        state: PlayHeadState,
    ) -> Result<(), GraphError> {
        for node in &topology.nodes {
            node.process(range, state)?;
        }
        Ok(())
    }

    fn process_parallel(
        &self,
        topology: &Arc<Topology>,
        range: SampleRange,
        state: PlayHeadState,
    ) -> Result<(), GraphError> {
        let jobs = self.pool.job_sender().ok_or(GraphError::PoolShutDown)?;
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let epoch = Arc::new(Epoch {
            topology: topology.clone(),
            remaining: topology
                .input_counts
                .iter()
                .map(|&count| AtomicUsize::new(count))
                .collect(),
            pending: AtomicUsize::new(topology.nodes.len()),
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
            done: done_tx,
            jobs,
            range,
            state,
        });

        for (index, &count) in topology.input_counts.iter().enumerate() {
            if count == 0 {
                let epoch = epoch.clone();
                self.pool.execute(move || run_node(&epoch, index));
            }
        }

        done_rx.recv().map_err(|_| GraphError::PoolShutDown)?;
        if let Some(error) = epoch.error.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

fn run_node(epoch: &Arc<Epoch>, index: usize) {
    if epoch.failed.load(Ordering::Acquire) {
        return;
    }
    match epoch.topology.nodes[index].process(epoch.range, epoch.state) {
        Err(error) => {
            *epoch.error.lock() = Some(error);
            epoch.failed.store(true, Ordering::Release);
            let _ = epoch.done.send(());
        }
        Ok(()) => {
            for &dependent in &epoch.topology.dependents[index] {
                if epoch.remaining[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                    let next = epoch.clone();
                    let _ = epoch.jobs.send(Box::new(move || run_node(&next, dependent)));
                }
            }
            if epoch.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _ = epoch.done.send(());
            }
        }
    }
}

impl Player for MultiThreadedPlayer {
    fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize) -> Result<(), GraphError> {
        let nodes = prepare_tree(&self.root, sample_rate, block_size)?;
        self.topology = Some(Arc::new(Self::build_topology(nodes)));
        Ok(())
    }

    fn process_block(
        &mut self,
        range: SampleRange,
        state: PlayHeadState,
    ) -> Result<(), GraphError> {
        let topology = self.topology.clone().ok_or(GraphError::NotPrepared)?;
        for node in &topology.nodes {
            node.reset_processed();
        }
        if self.pool.num_workers() <= 1 {
            self.process_sequential(&topology, range, state)
        } else {
            self.process_parallel(&topology, range, state)
        }
    }

    fn root(&self) -> &NodeRef {
        &self.root
    }
}
