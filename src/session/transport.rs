use std::io::{self, Write};

use async_trait::async_trait;

/// Where the session driver renders its output.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, author: Option<&str>, content: &str) -> anyhow::Result<()>;

    async fn step_started(&self, name: &str) -> anyhow::Result<()>;

    async fn step_finished(&self, name: &str, output: &str) -> anyhow::Result<()>;

    async fn stream_fragment(&self, fragment: &str) -> anyhow::Result<()>;

    async fn finish_stream(&self) -> anyhow::Result<()>;
}

/// Plain stdout rendering for the interactive CLI.
#[derive(Debug, Default)]
pub struct TerminalTransport;

#[async_trait]
impl ChatTransport for TerminalTransport {
    async fn send(&self, author: Option<&str>, content: &str) -> anyhow::Result<()> {
        match author {
            Some(author) => println!("\n{author}:\n{content}\n"),
            None => println!("\n{content}\n"),
        }
        Ok(())
    }

    async fn step_started(&self, name: &str) -> anyhow::Result<()> {
        println!("▸ {name}");
        Ok(())
    }

    async fn step_finished(&self, _name: &str, output: &str) -> anyhow::Result<()> {
        println!("  ✔ {output}");
        Ok(())
    }

    async fn stream_fragment(&self, fragment: &str) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    async fn finish_stream(&self) -> anyhow::Result<()> {
        println!("\n");
        Ok(())
    }
}
