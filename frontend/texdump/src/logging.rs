use slog::Drain;

pub fn init(verbose: bool) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator)
        .use_custom_timestamp(|_: &mut dyn std::io::Write| Ok(()))
        .build()
        .fuse();
    let level = if verbose {
        slog::Level::Debug
    } else {
        slog::Level::Info
    };
    slog::Logger::root(
        slog_async::Async::new(drain.filter_level(level).fuse())
            .overflow_strategy(slog_async::OverflowStrategy::Block)
            .thread_name("async logger".to_string())
            .build()
            .fuse(),
        slog::o!(),
    )
}
