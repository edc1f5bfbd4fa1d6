//! Concurrent builds of one directory are serialized by the build lock.

use std::fs;
use std::sync::Arc;
use std::thread;

use super::common::Fixture;

#[test]
fn concurrent_builds_never_overlap() {
  let fx = Arc::new(Fixture::new());
  fx.build(&fx.config()).unwrap();
  fx.touch("slow");

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let fx = Arc::clone(&fx);
      thread::spawn(move || fx.build(&fx.config()).map(|report| report.steps.len()))
    })
    .collect();
  for handle in handles {
    assert_eq!(handle.join().unwrap().unwrap(), 6);
  }

  let events = fs::read_to_string(fx.project.join("events.log")).unwrap();
  let events: Vec<_> = events.lines().collect();
  assert_eq!(events.len(), 8);
  for pair in events.chunks(2) {
    assert_eq!(pair, ["start", "end"]);
  }
}
