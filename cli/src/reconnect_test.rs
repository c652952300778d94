use super::*;

fn policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy { interval: Duration::from_millis(250), max_attempts }
}

#[test]
fn default_policy_is_three_seconds_ten_attempts() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.interval, Duration::from_secs(3));
    assert_eq!(policy.max_attempts, 10);
}

#[test]
fn retries_use_a_fixed_interval() {
    let mut agent = Reconnector::new(policy(5));
    for expected in 1..=5 {
        assert_eq!(agent.on_disconnected(), Decision::Retry { attempt: expected, after: Duration::from_millis(250) });
    }
}

#[test]
fn gives_up_after_budget_and_stays_given_up() {
    let mut agent = Reconnector::new(policy(2));
    assert!(matches!(agent.on_disconnected(), Decision::Retry { attempt: 1, .. }));
    assert!(matches!(agent.on_disconnected(), Decision::Retry { attempt: 2, .. }));
    assert_eq!(agent.on_disconnected(), Decision::GiveUp { attempts: 2 });
    assert_eq!(agent.on_disconnected(), Decision::GiveUp { attempts: 2 });
}

#[test]
fn successful_connect_resets_the_counter() {
    let mut agent = Reconnector::new(policy(3));
    agent.on_disconnected();
    agent.on_disconnected();
    assert_eq!(agent.attempts(), 2);

    agent.on_connected();
    assert_eq!(agent.attempts(), 0);
    assert!(matches!(agent.on_disconnected(), Decision::Retry { attempt: 1, .. }));
}

#[test]
fn zero_budget_gives_up_immediately() {
    let mut agent = Reconnector::new(policy(0));
    assert_eq!(agent.on_disconnected(), Decision::GiveUp { attempts: 0 });
}
