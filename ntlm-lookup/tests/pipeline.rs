use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use ntlm_lookup::{
    Batch, BatchResponse, Delay, DriverConfig, Error, HashType, LookupClient, LookupOutcome,
    ResultSink, RetryDriver, chunk, read_hashes,
};

const INPUT: &str = "\
CORP\\jdoe:1001:aad3b435b51404eeaad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::
CORP\\asmith:1002:aad3b435b51404eeaad3b435b51404ee:8846F7EAEE8FB117AD06BDD830B7586C:::

not a hash
  8846f7eaee8fb117ad06bdd830b7586c
31d6cfe0d16ae931b73c59d7e0c089c0
CORP\\jdoe:1001:aad3b435b51404eeaad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::
";

/// Answers each request from a queue and records what was sent.
struct FakeService {
    replies: Mutex<VecDeque<Result<BatchResponse, Error>>>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl FakeService {
    fn new(replies: Vec<Result<BatchResponse, Error>>) -> Self {
        Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) }
    }
}

impl LookupClient for &FakeService {
    async fn lookup_single(&self, _: HashType, hash: &str) -> LookupOutcome {
        LookupOutcome::NotFound(hash.to_string())
    }

    async fn lookup_batch(&self, _: HashType, batch: &Batch) -> Result<BatchResponse, Error> {
        self.requests.lock().unwrap().push(batch.hashes.clone());
        self.replies.lock().unwrap().pop_front().expect("no scripted reply left")
    }
}

#[derive(Default)]
struct NoWait {
    total: Mutex<Duration>,
}

impl Delay for &NoWait {
    async fn sleep(&self, duration: Duration) {
        *self.total.lock().unwrap() += duration;
    }
}

fn reply(status: u16, body: &str) -> Result<BatchResponse, Error> {
    Ok(BatchResponse { status, lines: body.lines().map(String::from).collect() })
}

#[tokio::test]
async fn test_dump_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dump.txt");
    let output = dir.path().join("results.txt");
    std::fs::write(&input, INPUT).unwrap();

    let hashes = read_hashes(&input, HashType::Nt).await.unwrap();
    assert_eq!(hashes.len(), 3);

    let batches = chunk(&hashes.sorted(), 2).unwrap();
    assert_eq!(batches.len(), 2);

    let service = FakeService::new(vec![
        reply(429, ""),
        reply(200, "31d6cfe0d16ae931b73c59d7e0c089c0:\n5835048ce94ad0564e29a924a03510ef:Summer2024!"),
        reply(200, "8846f7eaee8fb117ad06bdd830b7586c:password"),
    ]);
    let wait = NoWait::default();
    let mut driver = RetryDriver::new(&service, &wait, DriverConfig::default(), batches);

    let mut sink = ResultSink::open(Some(output.as_path()), false).unwrap();
    let summary = driver.run(&mut sink).await.unwrap();
    sink.finish().unwrap();

    assert_eq!(summary.found, 2);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.throttled, 1);

    // the throttled batch is resent unchanged
    let requests = service.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(
        requests[0],
        vec![
            "31d6cfe0d16ae931b73c59d7e0c089c0".to_string(),
            "5835048ce94ad0564e29a924a03510ef".to_string(),
        ]
    );

    let written = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Warning: Rate limited"));
    assert_eq!(lines[1], "31d6cfe0d16ae931b73c59d7e0c089c0:[not found]");
    assert_eq!(lines[2], "5835048ce94ad0564e29a924a03510ef:Summer2024!");
    assert_eq!(lines[3], "8846f7eaee8fb117ad06bdd830b7586c:password");

    assert_eq!(*wait.total.lock().unwrap(), Duration::from_secs(900 + 5));
}

#[tokio::test]
async fn test_empty_input_produces_no_requests() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    std::fs::write(&input, "").unwrap();

    let hashes = read_hashes(&input, HashType::Nt).await.unwrap();
    let batches = chunk(&hashes.sorted(), 300).unwrap();
    assert!(batches.is_empty());

    let service = FakeService::new(Vec::new());
    let wait = NoWait::default();
    let mut driver = RetryDriver::new(&service, &wait, DriverConfig::default(), batches);
    let mut sink = ResultSink::new(Some(Vec::new()));

    let summary = driver.run(&mut sink).await.unwrap();

    assert_eq!(summary.batches, 0);
    assert!(sink.finish().unwrap().unwrap().is_empty());
    assert!(service.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_every_hash_gets_exactly_one_line() {
    let hashes: Vec<String> = (0..750u32).map(|i| format!("{i:032x}")).collect();
    let batches = chunk(&hashes, 300).unwrap();

    // every third hash of each batch is known to the service
    let replies = batches
        .iter()
        .map(|b| {
            let body: Vec<String> =
                b.hashes.iter().step_by(3).map(|h| format!("{h}:pw-{h}")).collect();
            reply(200, &body.join("\n"))
        })
        .collect();
    let service = FakeService::new(replies);
    let wait = NoWait::default();
    let mut driver = RetryDriver::new(&service, &wait, DriverConfig::default(), batches);
    let mut sink = ResultSink::new(Some(Vec::new()));

    let summary = driver.run(&mut sink).await.unwrap();
    let written = String::from_utf8(sink.finish().unwrap().unwrap()).unwrap();

    let emitted: Vec<&str> = written.lines().map(|l| l.split_once(':').unwrap().0).collect();
    assert_eq!(emitted, hashes.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(summary.found + summary.not_found, hashes.len());
    assert_eq!(summary.found, 100 + 100 + 50);
}
