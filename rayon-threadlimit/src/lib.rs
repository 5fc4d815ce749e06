use {log::warn, std::env};

// Cap each pool at half the cpu core count so concurrent pools do not
// oversubscribe the machine.
static MAX_RAYON_THREADS: std::sync::LazyLock<usize> = std::sync::LazyLock::new(|| {
    env::var("RIFFLE_RAYON_THREADS")
        .ok()
        .and_then(|num_threads| match num_threads.parse() {
            Ok(num_threads) => Some(num_threads),
            Err(err) => {
                warn!("invalid RIFFLE_RAYON_THREADS value {num_threads:?}: {err}");
                None
            }
        })
        .unwrap_or_else(|| num_cpus::get() / 2)
        .max(1)
});

pub fn get_thread_count() -> usize {
    *MAX_RAYON_THREADS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_thread_count() {
        let num_threads = get_thread_count();
        assert!(num_threads >= 1);
        // The limit is computed once and then stable.
        assert_eq!(get_thread_count(), num_threads);
    }
}
