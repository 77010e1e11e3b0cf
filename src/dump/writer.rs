// ABOUTME: Single-consumer output writer for the schema script
// ABOUTME: Workers hand finished table blocks to a bounded channel; one task owns the output stream

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Order in which table blocks reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputOrder {
    /// As soon as each table finishes
    #[default]
    Completion,
    /// In table-list order, holding early finishers back
    Submission,
}

enum Message {
    Block { seq: usize, text: String },
    Skip { seq: usize },
    Section(String),
}

/// Producer handle given to table workers
#[derive(Clone)]
pub struct ScriptSender {
    tx: mpsc::Sender<Message>,
}

impl ScriptSender {
    /// Queue the block of the table submitted at position `seq`
    pub async fn send(&self, seq: usize, text: String) -> Result<()> {
        self.tx
            .send(Message::Block { seq, text })
            .await
            .map_err(|_| anyhow!("Output writer stopped"))
    }

    /// Mark position `seq` as producing no block
    pub async fn skip(&self, seq: usize) -> Result<()> {
        self.tx
            .send(Message::Skip { seq })
            .await
            .map_err(|_| anyhow!("Output writer stopped"))
    }
}

/// Owner side of the output channel
///
/// Each message is written with a single `write_all` by the consumer task,
/// so two blocks can never interleave.
pub struct ScriptWriter<W> {
    tx: mpsc::Sender<Message>,
    consumer: JoinHandle<Result<(W, u64)>>,
}

impl<W> ScriptWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(sink: W, capacity: usize, order: OutputOrder) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let consumer = tokio::spawn(consume(sink, rx, order));
        Self { tx, consumer }
    }

    pub fn sender(&self) -> ScriptSender {
        ScriptSender {
            tx: self.tx.clone(),
        }
    }

    /// Write a job-level section (metadata, views, routines)
    ///
    /// Callers send sections only while no table worker is running; in
    /// submission order any blocks still held back are released first.
    pub async fn write_section(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(Message::Section(text.into()))
            .await
            .map_err(|_| anyhow!("Output writer stopped"))
    }

    /// Close the channel, wait for every queued block to be written and
    /// return the sink with the number of bytes written
    pub async fn finish(self) -> Result<(W, u64)> {
        let Self { tx, consumer } = self;
        drop(tx);
        consumer.await.context("Output writer task failed")?
    }

    /// True once the consumer has exited, which before [`finish`](Self::finish)
    /// only happens when writing to the sink failed
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    /// Shut the writer down after `error` and return the error to report
    ///
    /// If the consumer stopped on a write failure, that failure is the cause
    /// of `error` and is returned in its place.
    pub async fn fail(self, error: anyhow::Error) -> anyhow::Error {
        match self.finish().await {
            Ok(_) => error,
            Err(cause) => {
                tracing::debug!("Superseded by output failure: {:#}", error);
                cause
            }
        }
    }
}

async fn consume<W>(
    mut sink: W,
    mut rx: mpsc::Receiver<Message>,
    order: OutputOrder,
) -> Result<(W, u64)>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    let mut next_seq = 0usize;
    let mut held: BTreeMap<usize, Option<String>> = BTreeMap::new();

    while let Some(message) = rx.recv().await {
        match (message, order) {
            (Message::Section(text), _) => {
                if !held.is_empty() {
                    tracing::warn!(
                        "Releasing {} held block(s) with gaps in table order",
                        held.len()
                    );
                    for (seq, text) in std::mem::take(&mut held) {
                        if let Some(text) = text {
                            write_block(&mut sink, &text, &mut written).await?;
                        }
                        next_seq = seq + 1;
                    }
                }
                write_block(&mut sink, &text, &mut written).await?;
            }
            (Message::Block { text, .. }, OutputOrder::Completion) => {
                write_block(&mut sink, &text, &mut written).await?;
            }
            (Message::Skip { .. }, OutputOrder::Completion) => {}
            (Message::Block { seq, text }, OutputOrder::Submission) => {
                held.insert(seq, Some(text));
                release_in_order(&mut sink, &mut held, &mut next_seq, &mut written).await?;
            }
            (Message::Skip { seq }, OutputOrder::Submission) => {
                held.insert(seq, None);
                release_in_order(&mut sink, &mut held, &mut next_seq, &mut written).await?;
            }
        }
    }

    sink.flush().await.context("Failed to flush output")?;
    Ok((sink, written))
}

async fn release_in_order<W>(
    sink: &mut W,
    held: &mut BTreeMap<usize, Option<String>>,
    next_seq: &mut usize,
    written: &mut u64,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(entry) = held.remove(next_seq) {
        if let Some(text) = entry {
            write_block(sink, &text, written).await?;
        }
        *next_seq += 1;
    }
    Ok(())
}

async fn write_block<W>(sink: &mut W, text: &str, written: &mut u64) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(text.as_bytes())
        .await
        .context("Failed to write to output")?;
    *written += text.len() as u64;
    Ok(())
}
