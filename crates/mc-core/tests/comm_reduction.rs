use std::thread;

use mc_core::comm::{gather, Communicator, SingleProcess, ThreadComm};
use mc_core::McError;

#[test]
fn single_process_reductions_are_identity() {
    let comm = SingleProcess;
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.size(), 1);
    assert_eq!(comm.sum_u64s(&[3, 4]).unwrap(), vec![3, 4]);
    assert_eq!(comm.sum_f64s(&[1.5, -2.0]).unwrap(), vec![1.5, -2.0]);
    let gathered: Vec<String> = gather(&comm, &"state".to_string()).unwrap();
    assert_eq!(gathered, vec!["state".to_string()]);
}

#[test]
fn thread_group_sums_are_identical_on_every_rank() {
    let handles: Vec<_> = ThreadComm::group(4)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let rank = comm.rank() as u64;
                let counts = comm.sum_u64s(&[rank, 1]).unwrap();
                let sums = comm.sum_f64s(&[0.5 * rank as f64]).unwrap();
                // A second round exercises slot reuse between collectives.
                let again = comm.sum_u64s(&[10]).unwrap();
                (counts, sums, again)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (counts, sums, again) in &results {
        assert_eq!(counts, &vec![6, 4]);
        assert_eq!(sums, &vec![3.0]);
        assert_eq!(again, &vec![40]);
    }
}

#[test]
fn gather_returns_values_in_rank_order() {
    let handles: Vec<_> = ThreadComm::group(3)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let local = vec![comm.rank() as u32; comm.rank() + 1];
                gather(&comm, &local).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let gathered = handle.join().unwrap();
        assert_eq!(gathered, vec![vec![0], vec![1, 1], vec![2, 2, 2]]);
    }
}

#[test]
fn mismatched_payloads_are_reported() {
    let handles: Vec<_> = ThreadComm::group(2)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let values = vec![1u64; comm.rank() + 1];
                comm.sum_u64s(&values)
            })
        })
        .collect();
    for handle in handles {
        let result = handle.join().unwrap();
        assert!(result.is_err());
    }
}

#[test]
fn abort_wakes_blocked_peers_and_spares_finished_rounds() {
    let mut group = ThreadComm::group(3);
    let last = group.pop().unwrap();
    let handles: Vec<_> = group
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let first = comm.sum_u64s(&[1]);
                let second = comm.sum_u64s(&[1]);
                (first, second)
            })
        })
        .collect();
    assert_eq!(last.sum_u64s(&[1]).unwrap(), vec![3]);
    last.abort();
    for handle in handles {
        let (first, second) = handle.join().unwrap();
        assert_eq!(first.unwrap(), vec![3]);
        let err = second.unwrap_err();
        assert!(matches!(err, McError::Reduction(_)));
        assert_eq!(err.info().code, "worker-aborted");
        assert_eq!(err.info().context["aborted_by"], "2");
    }
    assert_eq!(last.sum_u64s(&[1]).unwrap_err().info().code, "worker-aborted");
}
