use proptest::prelude::*;
use slots::{Finalize, MergeTree, SharedMergeTree, SlotId};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn label(i: usize) -> String {
    format!("[{i}]")
}

proptest! {
    #[test]
    fn any_completion_order_yields_creation_order(
        (n, order, root_at) in (1usize..10).prop_flat_map(|n| {
            (Just(n), Just((0..n).collect::<Vec<_>>()).prop_shuffle(), 0..=n)
        })
    ) {
        let mut tree = MergeTree::new();
        let root = tree.create(None, None).unwrap();
        let children: Vec<SlotId> = (0..n)
            .map(|_| tree.create(Some(root), None).unwrap())
            .collect();

        let mut delivered = Vec::new();
        for (step, &i) in order.iter().enumerate() {
            if step == root_at {
                if let Finalize::Delivered(out) = tree.finalize(root, None).unwrap() {
                    delivered.push(out);
                }
            }
            tree.write(children[i], &label(i)).unwrap();
            if let Finalize::Delivered(out) = tree.finalize(children[i], None).unwrap() {
                delivered.push(out);
            }
        }
        if root_at == n {
            if let Finalize::Delivered(out) = tree.finalize(root, None).unwrap() {
                delivered.push(out);
            }
        }

        let expected: String = (0..n).map(label).collect();
        prop_assert_eq!(delivered, vec![expected]);
    }

    #[test]
    fn nested_slots_complete_in_any_order(
        order in Just((0..9usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        // Slot 0 is the root, 1..=4 its children, 5..=8 one grandchild each.
        let mut tree = MergeTree::new();
        let root = tree.create(None, None).unwrap();
        let mut ids = vec![root];
        for _ in 0..4 {
            ids.push(tree.create(Some(root), None).unwrap());
        }
        for c in 1..=4 {
            let parent = ids[c];
            ids.push(tree.create(Some(parent), None).unwrap());
        }

        let mut delivered = Vec::new();
        for &k in &order {
            tree.write(ids[k], &label(k)).unwrap();
            match tree.finalize(ids[k], None).unwrap() {
                Finalize::Delivered(out) => delivered.push(out),
                Finalize::AlreadyFinalized => prop_assert!(false, "slot {} finalized twice", k),
                _ => {}
            }
        }

        let mut expected = String::new();
        for c in 1..=4 {
            expected.push_str(&label(c + 4));
            expected.push_str(&label(c));
        }
        expected.push_str(&label(0));
        prop_assert_eq!(delivered, vec![expected]);
    }
}

#[test]
fn workers_finishing_in_reverse_stream_in_order() {
    let tree = SharedMergeTree::new();
    let (tx, rx) = mpsc::channel::<String>();
    let root = tree.root(Some(Box::new(tx))).unwrap();
    root.write("start;").unwrap();
    let children: Vec<_> = (0..4).map(|_| root.child().unwrap()).collect();
    root.write("end").unwrap();
    root.finalize().unwrap();

    let workers: Vec<_> = children
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10 * (4 - i as u64)));
                slot.write(&format!("w{i};")).unwrap();
                slot.finalize().unwrap()
            })
        })
        .collect();

    let outcomes: Vec<Finalize> = workers
        .into_iter()
        .map(|w| w.join().expect("worker panicked"))
        .collect();
    let delivered: Vec<_> = outcomes
        .into_iter()
        .filter_map(|o| match o {
            Finalize::Delivered(out) => Some(out),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec!["start;w0;w1;w2;w3;end".to_string()]);

    let streamed: String = rx.try_iter().collect();
    assert_eq!(streamed, "start;w0;w1;w2;w3;end");
}

#[test]
fn unfinished_worker_keeps_root_pending() {
    let tree = SharedMergeTree::new();
    let root = tree.root(None).unwrap();
    let done = root.child().unwrap();
    let _stuck = root.child().unwrap();
    let worker = thread::spawn(move || done.finalize().unwrap());
    assert_eq!(worker.join().expect("worker panicked"), Finalize::Completed);
    assert_eq!(root.finalize().unwrap(), Finalize::Pending);
    assert_eq!(root.pending_children().unwrap(), 1);
    assert!(!root.is_finalized().unwrap());
}
