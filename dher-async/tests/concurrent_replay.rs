use anyhow::Result;
use dher_async::{EpisodeWriter, EpisodeWriterConfig};
use dher_core::{
    Episode, EpisodeShape, EpisodeStoreConfig, GoalDistanceReward, ReplayBufferError, Rows,
    SharedEpisodeStore, TransitionSampler, TransitionSamplerConfig, TransitionSource, SUCCESS_KEY,
};
use std::{collections::BTreeMap, thread};

const T: usize = 5;
const N_WORKERS: usize = 4;
const N_BATCHES: usize = 50;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Workers walk along the same line towards goals on it, so episodes of
/// different workers intersect.
fn episode(worker: usize, i: usize) -> Episode {
    let start = ((worker + i) % 7) as f32;
    let mut info = BTreeMap::new();
    info.insert(SUCCESS_KEY.to_string(), Rows::zeros(T, 1));
    Episode {
        obs: Rows::from_rows(2, (0..=T).map(|t| [worker as f32, t as f32])),
        achieved_goal: Rows::from_rows(3, (0..=T).map(|t| [start + t as f32, 0.0, 0.0])),
        desired_goal: Rows::from_rows(3, (0..=T).map(|_| [start + 3.0, 0.0, 0.0])),
        action: Rows::from_rows(1, (0..T).map(|t| [t as f32])),
        reward: Rows::zeros(T, 1),
        info,
    }
}

#[test]
fn test_concurrent_writers_and_reader() -> Result<()> {
    init();
    let store = SharedEpisodeStore::build(
        &EpisodeStoreConfig::default()
            .capacity(32)
            .shape(EpisodeShape::new(T, 2, 3, 1)),
    )?;
    let config = EpisodeWriterConfig::default().channel_capacity(4);
    let (writer, sender) = EpisodeWriter::spawn(&config, store.clone());

    let workers: Vec<_> = (0..N_WORKERS)
        .map(|w| {
            let sender = sender.clone();
            thread::spawn(move || {
                for i in 0..N_BATCHES {
                    let batch = vec![episode(w, i), episode(w, i + 1)];
                    if sender.send(batch).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(sender);

    let reader = {
        let store = store.clone();
        thread::spawn(move || -> Result<usize> {
            let mut sampler = TransitionSampler::build(&TransitionSamplerConfig::default());
            let reward = GoalDistanceReward::sparse(0.05);
            let mut n_synthetic = 0;
            for _ in 0..200 {
                match store.sample(&mut sampler, 64, &reward) {
                    Ok(batch) => {
                        assert_eq!(batch.len(), 64);
                        for source in batch.sources.iter() {
                            if let TransitionSource::Intersection { achieved, desired } = source {
                                assert_ne!(achieved.episode, desired.episode);
                                assert!(achieved.step < T && desired.step < T);
                            }
                        }
                        n_synthetic += batch.n_synthetic();
                    }
                    Err(ReplayBufferError::EmptyBuffer) => thread::yield_now(),
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(n_synthetic)
        })
    };

    for worker in workers {
        worker.join().expect("worker panicked");
    }
    let stats = writer.join()?;
    let n_synthetic = reader.join().expect("reader panicked")?;

    assert_eq!(stats.n_batches, N_WORKERS * N_BATCHES);
    assert_eq!(stats.n_episodes, 2 * N_WORKERS * N_BATCHES);
    assert_eq!(stats.n_rejected, 0);
    assert!(store.is_full());
    assert_eq!(store.stats().n_transitions_stored, 2 * N_WORKERS * N_BATCHES * T);

    // Every episode failed, so intersections always feed the sampler.
    let mut sampler = TransitionSampler::build(&TransitionSamplerConfig::default());
    let batch = store.sample(&mut sampler, 100, &GoalDistanceReward::sparse(0.05))?;
    assert_eq!(batch.n_synthetic(), 80);
    log::info!("Reader drew {} synthetic transitions", n_synthetic);
    Ok(())
}
