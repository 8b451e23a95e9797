// tests/graph_properties.rs

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use cellflow::notebook::CellBook;
use cellflow::types::CellKind;

// Cell `i` writes `v{i}` and only reads variables of cells before it, so the
// generated notebook is always acyclic.
fn acyclic_notebook(max_cells: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_cells).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let reads: BTreeSet<usize> =
                            picks.into_iter().filter(|_| i > 0).map(|p| p % i.max(1)).collect();
                        reads.into_iter().collect()
                    })
                    .collect()
            },
        )
    })
}

fn source(i: usize, reads: &[usize]) -> String {
    let mut expr = String::from("0");
    for r in reads {
        expr.push_str(&format!(" + v{r}"));
    }
    format!("v{i} = {expr}")
}

fn book(reads: &[Vec<usize>]) -> CellBook {
    let mut book = CellBook::new("prop");
    for (i, r) in reads.iter().enumerate() {
        book.add_cell(format!("c{i}"), CellKind::Code, source(i, r))
            .expect("unique ids");
    }
    book
}

proptest! {
    #[test]
    fn full_plan_respects_every_edge(reads in acyclic_notebook(12)) {
        let book = book(&reads);
        prop_assert!(book.graph().detect_cycle().is_none());

        let order = book.plan(&book.cell_ids()).unwrap();
        prop_assert_eq!(order.len(), reads.len());

        let pos: HashMap<_, _> = order.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        for (producer, consumer) in book.graph().edges() {
            prop_assert!(pos[&producer] < pos[&consumer], "{} ran after {}", producer, consumer);
        }
    }

    #[test]
    fn plan_covers_exactly_the_trigger_and_its_dependents(
        reads in acyclic_notebook(12),
        seed in any::<usize>(),
    ) {
        let book = book(&reads);
        let trigger = format!("c{}", seed % reads.len());

        let order = book.plan(&[trigger.as_str()]).unwrap();
        prop_assert_eq!(order.first(), Some(&trigger));

        let planned: BTreeSet<_> = order.iter().cloned().collect();
        let expected: BTreeSet<_> = book.graph().downstream_of(&[trigger.as_str()]).into_iter().collect();
        prop_assert_eq!(planned.len(), order.len(), "duplicate cell in plan");
        prop_assert_eq!(planned, expected);
    }

    #[test]
    fn closing_a_loop_is_always_reported(reads in acyclic_notebook(8)) {
        prop_assume!(reads.len() >= 2);
        let mut book = book(&reads);
        let last = reads.len() - 1;

        // c0 reads the last cell, which reads c0: a cycle through both.
        book.update_source("c0", format!("v0 = v{last}")).unwrap();
        book.update_source(&format!("c{last}"), format!("v{last} = v0")).unwrap();

        let cycle = book.graph().detect_cycle();
        prop_assert!(cycle.is_some());
        prop_assert!(book.is_cyclic("c0"));
        let last_id = format!("c{last}");
        prop_assert!(book.is_cyclic(&last_id));
    }
}
