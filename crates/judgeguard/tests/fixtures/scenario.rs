//! Fixture submission for the integration tests
//!
//! Usage: judgeguard-scenario <entry|hook> <scenario>

use std::hint::black_box;
use std::io::{self, Write};
use std::panic;
use std::process::ExitCode;
use std::thread;

use judgeguard::entry::{self, EntryReturn};
use judgeguard::{Config, HarnessError, HarnessKind, OutOfMemory, hook, oom, stdio};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [mode, scenario] = args.as_slice() else {
        eprintln!("usage: judgeguard-scenario <entry|hook> <scenario>");
        return ExitCode::from(2);
    };
    let scenario = scenario.clone();

    match mode.as_str() {
        "entry" => entry::run(move || submission(&scenario)),
        "hook" => {
            if let Err(err) = hook::install() {
                eprintln!("failed to install hook: {err}");
                return ExitCode::from(2);
            }
            if !hook::is_installed() {
                eprintln!("hook reported success but is not installed");
                return ExitCode::from(2);
            }
            let code = submission(&scenario).into_exit_code();
            ExitCode::from(code as u8)
        }
        other => {
            eprintln!("unknown mode: {other}");
            ExitCode::from(2)
        }
    }
}

fn submission(scenario: &str) -> Result<i32, String> {
    match scenario {
        "return-seven" => {
            writeln!(stdio::out(), "answer").map_err(|e| e.to_string())?;
            Ok(7)
        }
        "out-of-memory" => panic::panic_any(OutOfMemory),
        "io-out-of-memory" => panic::panic_any(io::Error::from(io::ErrorKind::OutOfMemory)),
        "runtime-error" => panic!("x"),
        "nested-unstructured" => Ok(level_one()),
        "allocate-huge" => {
            let block = vec![1u8; 1 << 33];
            Ok(i32::from(black_box(&block)[block.len() - 1]))
        }
        "recovered-then-abort" => {
            let mut big: Vec<u8> = Vec::new();
            if big.try_reserve(1 << 62).is_ok() {
                return Err("reservation unexpectedly succeeded".to_string());
            }
            if !oom::allocation_failed() {
                return Err("failed reservation was not recorded".to_string());
            }
            let small = black_box(vec![0u8; 16]);
            drop(small);
            if !oom::allocation_failed() {
                return Err("small allocation cleared the failure".to_string());
            }
            oom::clear();
            if oom::allocation_failed() {
                return Err("clear did not forget the failure".to_string());
            }
            std::process::abort()
        }
        "thread-panic" => {
            let worker = thread::spawn(|| -> i32 { panic!("worker failed") });
            match worker.join() {
                Ok(code) => Ok(code),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        "racing-failures" => {
            let workers: Vec<_> = (0..4)
                .map(|i| thread::spawn(move || -> i32 { panic!("worker {i} failed") }))
                .collect();
            for worker in workers {
                let _ = worker.join();
            }
            Ok(0)
        }
        "caught-locally" => match hook::catch_local(|| -> i32 { panic!("handled") }) {
            Ok(code) => Ok(code),
            Err(_) => Ok(3),
        },
        "terminate" => {
            writeln!(stdio::out(), "before terminate").map_err(|e| e.to_string())?;
            hook::terminate()
        }
        "result-error" => Err("bad input".to_string()),
        "buffered-line" => {
            writeln!(stdio::out(), "line").map_err(|e| e.to_string())?;
            let pending = stdio::out().buffered().len();
            Ok(pending as i32)
        }
        "install-twice" => match hook::install() {
            Ok(false) => panic!("x"),
            Ok(true) => Err("second install claimed the process again".to_string()),
            Err(err) => Err(err.to_string()),
        },
        "hook-after-entry" => match hook::install_with(&Config::default()) {
            Err(HarnessError::Conflict {
                active: HarnessKind::EntryRedirect,
                requested: HarnessKind::TerminationHook,
            }) if !hook::is_installed() => Ok(4),
            other => Err(format!("unexpected install result: {other:?}")),
        },
        "caught-by-catch-unwind" => {
            let caught = panic::catch_unwind(|| -> i32 { panic!("recovered") });
            Ok(if caught.is_err() { 5 } else { 6 })
        }
        other => Err(format!("unknown scenario: {other}")),
    }
}

fn level_one() -> i32 {
    level_two() + 1
}

fn level_two() -> i32 {
    level_three() + 1
}

fn level_three() -> i32 {
    panic::panic_any(42i32)
}
