mod common;

use std::sync::Arc;

use common::synthetic_log;
use scanchanges::parallel::{join_workers, spawn_workers, Coordinator};
use scanchanges::remote::{LeaderServer, RemoteWorkerChannels};
use scanchanges::{CommitRecord, KeywordMatcher, LogParser, Matcher, ScanError};

const SECRET: &[u8] = b"correct horse battery staple";

fn parse(log: &str) -> Vec<Arc<CommitRecord>> {
    LogParser::new()
        .parse(log)
        .expect("log parses")
        .into_iter()
        .map(Arc::new)
        .collect()
}

#[test]
fn test_followers_over_tcp_produce_ordered_matches() {
    let records = parse(&synthetic_log(45));
    let coordinator = Coordinator::default();
    let server =
        LeaderServer::start("127.0.0.1:0", SECRET.to_vec(), coordinator.distributor()).unwrap();
    let addr = server.local_addr();

    let matcher: Arc<dyn Matcher> = Arc::new(KeywordMatcher::security_keywords().unwrap());
    let followers =
        spawn_workers(3, &matcher, |_| RemoteWorkerChannels::connect(addr, SECRET)).unwrap();

    let outcome = coordinator.run(&records).unwrap();
    server.shutdown();
    let total = join_workers(followers).unwrap();

    let expected: Vec<_> = records.iter().step_by(3).cloned().collect();
    assert_eq!(outcome.matched, expected);
    assert_eq!(outcome.protocol_violations, 0);
    assert_eq!(total.processed, 45);
    assert_eq!(total.matched, 15);
}

#[test]
fn test_remote_and_local_workers_share_the_queue() {
    let records = parse(&synthetic_log(30));
    let coordinator = Coordinator::default();
    let server =
        LeaderServer::start("127.0.0.1:0", SECRET.to_vec(), coordinator.distributor()).unwrap();
    let addr = server.local_addr();

    let matcher: Arc<dyn Matcher> = Arc::new(KeywordMatcher::security_keywords().unwrap());
    let remote =
        spawn_workers(2, &matcher, |_| RemoteWorkerChannels::connect(addr, SECRET)).unwrap();
    let local = spawn_workers(2, &matcher, |_| {
        Ok(coordinator.distributor().worker_channels())
    })
    .unwrap();

    let outcome = coordinator.run(&records).unwrap();
    server.shutdown();
    let remote_total = join_workers(remote).unwrap();
    let local_total = join_workers(local).unwrap();

    assert_eq!(remote_total.processed + local_total.processed, 30);
    assert_eq!(outcome.matched.len(), 10);
}

#[test]
fn test_wrong_secret_is_rejected() {
    let coordinator = Coordinator::default();
    let server =
        LeaderServer::start("127.0.0.1:0", SECRET.to_vec(), coordinator.distributor()).unwrap();

    match RemoteWorkerChannels::connect(server.local_addr(), b"guess") {
        Err(ScanError::Authentication(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("follower with the wrong secret was accepted"),
    }

    // The leader keeps serving authenticated followers afterwards
    let records = parse(&synthetic_log(3));
    let matcher: Arc<dyn Matcher> = Arc::new(KeywordMatcher::security_keywords().unwrap());
    let addr = server.local_addr();
    let followers =
        spawn_workers(1, &matcher, |_| RemoteWorkerChannels::connect(addr, SECRET)).unwrap();
    let outcome = coordinator.run(&records).unwrap();
    server.shutdown();
    join_workers(followers).unwrap();
    assert_eq!(outcome.matched, vec![Arc::clone(&records[0])]);
}

#[test]
fn test_connect_to_closed_port_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(matches!(
        RemoteWorkerChannels::connect(addr, SECRET),
        Err(ScanError::Transport(_))
    ));
}
