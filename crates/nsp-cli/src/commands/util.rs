use rayon::ThreadPoolBuilder;
use tracing::debug;

/// Size of the horizon-step pool for a `--threads` value (`auto`, `0` or a count)
pub fn thread_count(value: &str) -> usize {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => num_cpus::get(),
    }
}

pub fn configure_threads(value: &str) -> usize {
    let count = thread_count(value);
    if ThreadPoolBuilder::new()
        .num_threads(count)
        .build_global()
        .is_err()
    {
        debug!("global thread pool already initialised");
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count() {
        assert_eq!(thread_count("3"), 3);
        assert_eq!(thread_count("auto"), num_cpus::get());
        assert_eq!(thread_count("0"), num_cpus::get());
        assert_eq!(thread_count("many"), num_cpus::get());
    }
}
