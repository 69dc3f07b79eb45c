//! Interactive request loop
//!
//! Request lines arrive on a channel and answers go to any writer. The loop ends on end
//! of input or when the shutdown future resolves, and the session always finishes with
//! [`Supervisor::shutdown`] so trained state is persisted even when serving fails.

use std::future::Future;
use std::io::Write;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::predict::Predictor;
use crate::supervisor::{ShutdownReport, Supervisor};
use crate::Result;

/// Answer request lines until end of input or `shutdown` resolves.
///
/// `shutdown` is polled for the whole session, ahead of the next line, so a signal that
/// fires while a request is being handled ends the loop right after it.
/// Returns the number of requests answered.
pub async fn serve_lines<P, S, W>(
    supervisor: &Supervisor<P>,
    mut lines: mpsc::Receiver<String>,
    shutdown: S,
    out: &mut W,
) -> Result<usize>
where
    P: Predictor,
    S: Future<Output = ()>,
    W: Write,
{
    tokio::pin!(shutdown);
    let mut answered = 0;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                log::info!("Closing");
                break;
            }
            line = lines.recv() => match line {
                Some(line) => match supervisor.handle_request(&line) {
                    Ok(response) => {
                        writeln!(out, "{}", response)?;
                        out.flush()?;
                        answered += 1;
                    }
                    Err(e) if e.is_recoverable() => eprintln!("{}", e),
                    Err(e) => return Err(e),
                },
                None => {
                    log::info!("End of input, closing");
                    break;
                }
            },
        }
    }

    Ok(answered)
}

/// Serve on `runtime`, then shut down and persist to `persist_to` whatever happened.
///
/// A serving error is returned after the snapshot has been written; a shutdown error is
/// returned when serving succeeded and logged otherwise.
pub fn run_session<P, S, W>(
    supervisor: Supervisor<P>,
    runtime: &Runtime,
    lines: mpsc::Receiver<String>,
    shutdown: S,
    out: &mut W,
    persist_to: &str,
) -> Result<ShutdownReport>
where
    P: Predictor,
    S: Future<Output = ()>,
    W: Write,
{
    let served = runtime.block_on(serve_lines(&supervisor, lines, shutdown, out));
    let report = supervisor.shutdown(persist_to);

    match served {
        Ok(answered) => {
            log::info!("Answered {} requests", answered);
            report
        }
        Err(e) => {
            match &report {
                Ok(report) => log::error!(
                    "Serving failed, network still saved to {}",
                    report.snapshot.display()
                ),
                Err(shutdown_err) => log::error!("Failed to save network: {}", shutdown_err),
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::scripted::ScriptedPredictor;
    use crate::{RecommenderError, TrainingParameters};
    use std::path::PathBuf;
    use tokio::sync::oneshot;

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn supervisor(predictor: ScriptedPredictor) -> Supervisor<ScriptedPredictor> {
        let params = TrainingParameters {
            epochs: 2,
            rate: 0.5,
            debug: false,
        };
        Supervisor::from_predictor(predictor, params).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "recommender-serve-{}-{}.network",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    /// Fires a shutdown trigger on its first write
    struct TriggeringSink {
        written: Vec<u8>,
        trigger: Option<oneshot::Sender<()>>,
    }

    impl Write for TriggeringSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(trigger) = self.trigger.take() {
                let _ = trigger.send(());
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Rejects every write like a closed pipe
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_serves_until_end_of_input() {
        let sup = supervisor(ScriptedPredictor::new(2, 1).with_fallback(vec![1.0]));
        let (tx, rx) = mpsc::channel(8);
        for line in ["0.1,0.2", "", "0.1,0.2 1", "1,2,3"] {
            tx.try_send(line.to_string()).unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let answered = runtime()
            .block_on(serve_lines(&sup, rx, std::future::pending(), &mut out))
            .unwrap();

        assert_eq!(answered, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Predicted value: [1.0]\nPredicted value: [1.0], matches: true\n"
        );
    }

    #[test]
    fn test_shutdown_during_request_ends_loop() {
        let sup = supervisor(ScriptedPredictor::new(1, 1));
        let (tx, rx) = mpsc::channel(8);
        for _ in 0..3 {
            tx.try_send("0.5".to_string()).unwrap();
        }

        // The signal fires while the first answer is being written; input stays open
        let (trigger, fired) = oneshot::channel();
        let shutdown = async {
            let _ = fired.await;
        };
        let mut sink = TriggeringSink {
            written: Vec::new(),
            trigger: Some(trigger),
        };

        let answered = runtime()
            .block_on(serve_lines(&sup, rx, shutdown, &mut sink))
            .unwrap();

        assert_eq!(answered, 1);
        assert_eq!(String::from_utf8(sink.written).unwrap(), "Predicted value: [0.0]\n");
        drop(tx);
    }

    #[test]
    fn test_session_persists_after_shutdown_signal() {
        let sup = supervisor(ScriptedPredictor::new(1, 1).learning());
        let (tx, rx) = mpsc::channel(8);
        tx.try_send("0.5 1".to_string()).unwrap();

        let path = temp_path("signal");
        let mut out = Vec::new();
        let report = run_session(
            sup,
            &runtime(),
            rx,
            async {},
            &mut out,
            path.to_str().unwrap(),
        )
        .unwrap();

        assert_eq!(report.snapshot, path);
        assert!(path.exists());
        drop(tx);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_output_failure_still_persists_corrections() {
        let sup = supervisor(ScriptedPredictor::new(1, 1).learning());
        let (tx, rx) = mpsc::channel(8);
        tx.try_send("0.5 1".to_string()).unwrap();
        drop(tx);

        let path = temp_path("broken-pipe");
        let err = run_session(
            sup,
            &runtime(),
            rx,
            std::future::pending(),
            &mut BrokenPipe,
            path.to_str().unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, RecommenderError::Io(_)));

        // The failed verification's correction made it into the snapshot
        let params = TrainingParameters::default();
        let restored =
            Supervisor::<ScriptedPredictor>::restore_from_path(path.to_str().unwrap(), params)
                .unwrap();
        assert_eq!(restored.predict(&[0.5]).unwrap(), vec![1.0]);

        std::fs::remove_file(&path).unwrap();
    }
}
