use rand::Rng;

use crate::models::task::Task;

pub const BATCH_SIZE: usize = 5;
pub const MIN_DURATION: f64 = 2000.0;
pub const MAX_DURATION: f64 = 6000.0;
const ID_LEN: usize = 5;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random uppercase base-36 token. Collisions are possible and not checked.
pub fn base36_token<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

pub fn generate_task<R: Rng>(rng: &mut R) -> Task {
    let id = base36_token(rng, ID_LEN);
    let duration = rng.random_range(MIN_DURATION..MAX_DURATION);
    Task::new(id, duration)
}

pub fn generate_batch<R: Rng>(rng: &mut R) -> Vec<Task> {
    (0..BATCH_SIZE).map(|_| generate_task(rng)).collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::models::task::TaskStatus;

    #[test]
    fn batch_has_five_pending_tasks_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let batch = generate_batch(&mut rng);
            assert_eq!(batch.len(), BATCH_SIZE);
            for task in batch {
                assert_eq!(task.status, TaskStatus::Pending);
                assert_eq!(task.progress, 0.0);
                assert!(task.duration() >= MIN_DURATION && task.duration() < MAX_DURATION);
                assert_eq!(task.id.len(), ID_LEN);
                assert!(task
                    .id
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
            }
        }
    }

    #[test]
    fn same_seed_same_batch() {
        let a = generate_batch(&mut ChaCha8Rng::seed_from_u64(42));
        let b = generate_batch(&mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
