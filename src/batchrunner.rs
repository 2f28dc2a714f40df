use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc::Sender,
    },
    thread::available_parallelism,
    time::Instant,
};

use anyhow::{Result, anyhow};
use log::{info, warn};
use serde::Serialize;

use crate::disc::{Disc, SimError, Trajectory};

/// One line of the batch summary
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub name: String,
    pub thread_id: usize,
    pub status: String,
    pub samples: usize,
    pub final_t: f64,
    pub final_x: f64,
    pub final_y: f64,
    pub sim_duration_us: i64,
}

pub struct BatchResult {
    pub summary: BatchSummary,
    pub trajectory: Result<Trajectory, SimError>,
}

fn worker(
    discs: Arc<Vec<Disc>>,
    flight_time: f64,
    thread_id: usize,
    run_index: Arc<AtomicUsize>,
    tx_result: Sender<BatchResult>,
) -> Result<()> {
    loop {
        let index = run_index.fetch_add(1, Ordering::Relaxed);

        let Some(disc) = discs.get(index) else {
            return Ok(());
        };

        let start_time = Instant::now();
        let trajectory = disc.compute_trajectory(flight_time);
        let sim_duration = Instant::now() - start_time;

        let (status, traj) = match &trajectory {
            Ok(traj) => (format!("{:?}", traj.status()), Some(traj)),
            Err(SimError::NumericalInstability { partial, .. }) => {
                ("NumericalInstability".to_string(), Some(partial.as_ref()))
            }
            Err(e) => (e.to_string(), None),
        };

        let summary = BatchSummary {
            index,
            name: disc.name().to_string(),
            thread_id,
            status,
            samples: traj.map_or(0, Trajectory::len),
            final_t: traj.and_then(Trajectory::final_time).unwrap_or(f64::NAN),
            final_x: traj.and_then(|t| t.x.last().copied()).unwrap_or(f64::NAN),
            final_y: traj.and_then(|t| t.y.last().copied()).unwrap_or(f64::NAN),
            sim_duration_us: sim_duration.as_micros() as i64,
        };

        tx_result.send(BatchResult {
            summary,
            trajectory,
        })?;
    }
}

/// Computes one trajectory per disc on a pool of worker threads. Discs are
/// only read during the runs.
pub struct BatchRunner {
    num_workers: usize,
    discs: Arc<Vec<Disc>>,
    flight_time: f64,
}

impl BatchRunner {
    pub fn new(discs: Vec<Disc>, flight_time: f64, num_workers: Option<usize>) -> Result<Self> {
        let num_workers = match num_workers {
            Some(n) => n,
            None => available_parallelism()?.get(),
        }
        .clamp(1, discs.len().max(1));

        info!(
            "Batch configuration: {num_workers} workers, {} discs, {flight_time} s",
            discs.len()
        );

        Ok(BatchRunner {
            num_workers,
            discs: Arc::new(discs),
            flight_time,
        })
    }

    /// Results are returned in the same order as the discs
    pub fn run_blocking(self) -> Result<Vec<BatchResult>> {
        let (tx_result, rx_result) = std::sync::mpsc::channel();
        let mut workers = vec![];

        let run_index = Arc::new(AtomicUsize::new(0));

        for i in 0..self.num_workers {
            let discs = self.discs.clone();
            let tx_result = tx_result.clone();
            let run_index = run_index.clone();
            let flight_time = self.flight_time;

            let worker =
                std::thread::spawn(move || worker(discs, flight_time, i, run_index, tx_result));

            workers.push(worker);
        }
        drop(tx_result);

        let mut results: Vec<Option<BatchResult>> = (0..self.discs.len()).map(|_| None).collect();

        while let Ok(result) = rx_result.recv() {
            let s = &result.summary;
            if result.trajectory.is_ok() {
                info!(
                    "Run {} '{}' (thread {}): {} after {:.3} s, x = {:.3} m ({:.3} ms)",
                    s.index,
                    s.name,
                    s.thread_id,
                    s.status,
                    s.final_t,
                    s.final_x,
                    s.sim_duration_us as f64 / 1000.0
                );
            } else {
                warn!("Run {} '{}' failed: {}", s.index, s.name, s.status);
            }

            let index = s.index;
            results[index] = Some(result);
        }

        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow!("Batch worker thread panicked"))??;
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.ok_or_else(|| anyhow!("Missing result for run {i}")))
            .collect()
    }
}
