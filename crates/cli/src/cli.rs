use clap::{Parser, Subcommand};

/// Transaction stream simulator and cache-augmented threat watcher.
#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about = "Transaction threat monitoring over Redis Streams")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish simulated transactions to the stream
    Stream {
        /// Delay between publishes, in milliseconds
        #[arg(long, default_value_t = 1000)]
        speed: u64,

        /// Stop after this many attempts (0 = run until interrupted)
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Consume the stream and analyse every transaction
    Watch,
}
