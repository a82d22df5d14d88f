#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use itc_batch::csv_parser::CsvParser;
use itc_batch::dispatch::{AssumeYes, DispatchError, DispatchOptions, DispatchSummary, Dispatcher};
use itc_batch::passphrase::{PassphraseMode, PassphraseResolver};
use itc_batch::tool::{ChainTool, ItcCli, ToolError, TransferRequest};

/// Stand-in for the itc binary. Addresses starting with `itc1` are valid,
/// the node has two shards, and transfers echo the batch file back unless
/// it mentions `itc1poison`.
const FAKE_ITC: &str = r#"
case "$1" in
  version)
    echo "itc version v1.0-fake"
    ;;
  utility)
    case "$2" in
      shards)
        echo '{"id":"1","jsonrpc":"2.0","result":[{"shardID":0},{"shardID":1}]}'
        ;;
      bech32-to-addr)
        case "$3" in
          itc1*) echo "0x0000000000000000000000000000000000000001" ;;
          *) echo "invalid bech32 address: $3" >&2; exit 1 ;;
        esac
        ;;
    esac
    ;;
  transfer)
    if grep -q itc1poison "$3"; then
      echo "insufficient balance" >&2
      exit 1
    fi
    echo "args: $*"
    cat "$3"
    ;;
  slow)
    exec sleep 5
    ;;
  slow-child)
    sleep 5
    echo "finished"
    ;;
esac
"#;

fn fake_cli(dir: &Path) -> ItcCli {
    let script = dir.join("itc-fake.sh");
    fs::write(&script, FAKE_ITC).unwrap();
    ItcCli::new("/bin/sh", vec![script.display().to_string()], Duration::from_secs(10))
}

/// Drops an executable `itc.sh` into `dir`; there is no `itc` next to it.
fn write_wrapper(dir: &Path, body: &str) {
    let wrapper = dir.join("itc.sh");
    fs::write(&wrapper, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).unwrap();
}

fn options(dir: &Path) -> DispatchOptions {
    DispatchOptions {
        node: "http://localhost:9500".to_string(),
        chain_id: None,
        batch_size: 2,
        timeout_per_tx: 5,
        fast: true,
        temp_dir: dir.to_path_buf(),
        log_dir: dir.to_path_buf(),
    }
}

fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("txs.csv");
    let mut body = String::from("from,to,amount,from-shard,to-shard,passphrase-file,passphrase-string,gas-price,gas-limit\n");
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn queries_shards_and_addresses_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());

    assert!(cli.version().unwrap().contains("fake"));
    assert_eq!(cli.shard_count("http://localhost:9500").unwrap(), 2);
    assert!(cli.validate_address("itc1abc").is_ok());

    match cli.validate_address("0xnotbech32") {
        Err(ToolError::Failed { output, .. }) => assert!(output.contains("invalid bech32 address")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn slow_calls_are_killed_at_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());
    let err = cli.call(&["slow"], Duration::from_millis(200)).unwrap_err();
    assert!(matches!(err, ToolError::Timeout { .. }));
}

#[test]
fn timeout_holds_when_the_script_leaves_a_child_running() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());
    let started = Instant::now();
    let err = cli.call(&["slow-child"], Duration::from_millis(200)).unwrap_err();
    assert!(matches!(err, ToolError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[test]
fn falls_back_to_the_wrapper_when_itc_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_wrapper(dir.path(), "echo \"wrapped: $*\"\n");

    let cli = ItcCli::locate(dir.path(), Duration::from_secs(10), false).unwrap();
    assert_eq!(cli.version().unwrap().trim_end(), "wrapped: -- version");
}

#[test]
fn verbose_flag_is_appended_to_every_call() {
    let dir = tempfile::tempdir().unwrap();
    write_wrapper(dir.path(), "echo \"wrapped: $*\"\n");

    let cli = ItcCli::locate(dir.path(), Duration::from_secs(10), true).unwrap();
    assert_eq!(cli.version().unwrap().trim_end(), "wrapped: -- version --verbose");
    let output = cli.call(&["utility", "shards", "-n", "http://localhost:9500"], Duration::from_secs(10)).unwrap();
    assert_eq!(output.trim_end(), "wrapped: -- utility shards -n http://localhost:9500 --verbose");
}

#[test]
fn missing_wrapper_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    match ItcCli::locate(dir.path(), Duration::from_secs(10), false) {
        Err(ToolError::NotFound(path)) => assert_eq!(path, dir.path()),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn failing_wrapper_is_reported_as_broken() {
    let dir = tempfile::tempdir().unwrap();
    write_wrapper(dir.path(), "echo \"itc binary missing\" >&2\nexit 1\n");
    match ItcCli::locate(dir.path(), Duration::from_secs(10), false) {
        Err(ToolError::WrapperBroken(path)) => assert_eq!(path, dir.path().join("itc.sh")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn transfer_passes_the_batch_file() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());
    let file = dir.path().join("batch.json");
    fs::write(&file, "[]").unwrap();

    let output = cli
        .transfer(&TransferRequest {
            file: &file,
            node: "http://localhost:9500",
            chain_id: None,
            fast: true,
            timeout_per_tx: 5,
            batch_len: 1,
        })
        .unwrap();
    assert!(output.contains("--timeout 0"));
    assert!(output.trim_end().ends_with("[]"));
}

#[test]
fn csv_to_batches_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());
    let csv = write_csv(
        dir.path(),
        &[
            "itc1a,itc1b,1,0,1,,,,",
            "itc1a,itc1c,2,0,0,,,,",
            "bad,itc1c,3,0,0,,,,",
            "itc1a,itc1d,4,,0,,,,",
            "itc1b,itc1a,5,1,1,,pw,,",
        ],
    );

    let report = CsvParser::new(&cli, "http://localhost:9500", PassphraseResolver::new(PassphraseMode::Default(String::new())))
        .with_progress(false)
        .parse(&csv)
        .unwrap();
    assert_eq!(report.transactions.len(), 3);
    assert_eq!(report.skipped.len(), 2);

    let summary = Dispatcher::new(&cli, options(dir.path()))
        .run(&report.transactions, &mut AssumeYes)
        .unwrap();
    match summary {
        DispatchSummary::Sent(outcomes) => {
            assert_eq!(outcomes.len(), 2);
            assert!(outcomes[0].output.contains("itc1b"));
            assert!(outcomes[1].output.contains("\"passphrase-string\":\"pw\""));
            for outcome in &outcomes {
                let log = fs::read_to_string(&outcome.log_file).unwrap();
                let (sent, _response) = log.split_once("\nResponse: ").unwrap();
                assert!(sent.starts_with("Sent-tx: "));
                assert!(!sent.contains("\"pw\""));
            }
        }
        other => panic!("unexpected summary: {:?}", other),
    }
}

#[test]
fn failing_batch_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path());
    let csv = write_csv(
        dir.path(),
        &[
            "itc1a,itc1b,1,0,0,,,,",
            "itc1a,itc1poison,1,0,0,,,,",
            "itc1a,itc1c,1,0,0,,,,",
        ],
    );
    let report = CsvParser::new(&cli, "http://localhost:9500", PassphraseResolver::new(PassphraseMode::Default(String::new())))
        .with_progress(false)
        .parse(&csv)
        .unwrap();

    let mut one_per_batch = options(dir.path());
    one_per_batch.batch_size = 1;
    let err = Dispatcher::new(&cli, one_per_batch)
        .run(&report.transactions, &mut AssumeYes)
        .unwrap_err();

    match err {
        DispatchError::BatchFailed { index, log_file, .. } => {
            assert_eq!(index, 1);
            let log = fs::read_to_string(log_file).unwrap();
            assert!(log.contains("insufficient balance"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with("itc-csv-"))
        .count();
    assert_eq!(leftovers, 0);
}
