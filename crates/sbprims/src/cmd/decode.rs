use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::sync::mpsc;
use std::sync::Arc;

use sbprims_dispatch::{FailureReport, Session, Subscription};
use sbprims_frame::{Frame, FrameConfig, ResyncPolicy};
use tracing::{debug, info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::messages::{self, KnownMessage};
use crate::output::{print_frame, OutputFormat};

type Delivered = (Frame, Option<KnownMessage>);

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path).map_err(|err| io_error(&format!("open {}", path.display()), err))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let config = FrameConfig {
        resync: if args.rescan {
            ResyncPolicy::Rescan
        } else {
            ResyncPolicy::Continue
        },
        ..FrameConfig::default()
    };
    let mut chunk = vec![0u8; config.read_chunk_size.max(1)];
    let mut session = Session::with_config(Arc::new(messages::registry()), config);

    let (tx, rx) = mpsc::channel::<Delivered>();
    let subscriptions = match &args.types {
        Some(types) => {
            let mut types = types.clone();
            types.sort_unstable();
            types.dedup();
            types.into_iter().map(Subscription::Type).collect()
        }
        None => vec![Subscription::Wildcard],
    };
    for subscription in subscriptions {
        let tx = tx.clone();
        session.register(subscription, move |frame, payload| {
            tx.send((frame.clone(), payload.decoded().cloned()))?;
            Ok(())
        });
    }
    drop(tx);

    let mut printed = 0usize;
    'read: loop {
        let read = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        };

        let report = session.feed(&chunk[..read]);
        for failure in &report.failures {
            log_failure(failure);
        }

        for (frame, decoded) in rx.try_iter() {
            let name = session.registry().name(frame.msg_type).unwrap_or("UNKNOWN");
            print_frame(&frame, name, decoded.as_ref(), format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                break 'read;
            }
        }
    }

    let stats = session.stats();
    info!(
        frames = stats.frames,
        printed,
        checksum_failures = stats.checksum_failures,
        discarded_bytes = stats.discarded_bytes,
        "decode finished"
    );

    Ok(SUCCESS)
}

// Checksum mismatches are already logged by the decoder.
fn log_failure(failure: &FailureReport) {
    match failure {
        FailureReport::ChecksumMismatch(mismatch) => {
            debug!(msg_type = mismatch.msg_type, "frame rejected")
        }
        FailureReport::Decode {
            msg_type, error, ..
        } => warn!(msg_type = *msg_type, %error, "printing raw payload"),
        FailureReport::Callback(failure) => warn!(%failure, "output callback failed"),
    }
}
