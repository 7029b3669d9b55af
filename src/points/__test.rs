use super::*;
use crate::primitive::Bound;

fn diagonal_tree(count: i64) -> OmnitreePoints<(i64, [i64; 3]), i64, fn(&(i64, [i64; 3])) -> [i64; 3], 3> {
    let mut tree = OmnitreePoints::new((|item| item.1) as fn(&(i64, [i64; 3])) -> [i64; 3]);
    for i in 0..count {
        tree.add((i, [i, i, i]));
    }
    tree
}

#[test]
fn add_then_range_query() {
    let tree = diagonal_tree(100);

    assert!(tree.count() == 100);
    assert!(tree.dimensions() == 3);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();

    let range = Bounds::from_min_max([50; 3], [99; 3]);
    assert!(tree.count_sub_space(&range) == 50);

    let mut visited = Vec::new();
    tree.stepper_range(&range, |item| visited.push(item.0));
    visited.sort();
    assert!(visited == (50..100).collect::<Vec<_>>());

    // The full stepper sees everything, and repeating it changes nothing.
    for _ in 0..2 {
        let mut total = 0;
        tree.stepper(|_| total += 1);
        assert!(total == 100);
    }
}

#[test]
fn open_sided_ranges() {
    let tree = diagonal_tree(100);

    // Only the max side bounded: everything at or below 49.
    let below = Bounds::new([Bound::None; 3], [Bound::Value(49); 3]);
    assert!(tree.count_sub_space(&below) == 50);

    // Fully open range covers the whole tree.
    assert!(tree.count_sub_space(&Bounds::none()) == 100);
}

#[test]
fn remove_and_try_remove() {
    let mut tree = diagonal_tree(100);

    let removed = tree.remove(&(5, [5, 5, 5])).unwrap();
    assert!(removed.0 == 5);
    assert!(tree.count() == 99);

    // A second removal of the same item finds nothing.
    assert!(tree.remove(&(5, [5, 5, 5])) == Err(Error::NotFound));
    assert!(tree.try_remove(&(5, [5, 5, 5])) == false);

    // Value must match too, not only the coordinates.
    assert!(tree.try_remove(&(999, [6, 6, 6])) == false);
    assert!(tree.try_remove(&(6, [6, 6, 6])) == true);

    assert!(tree.count() == 98);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}

#[test]
fn removal_merges_back_to_leaf() {
    let mut tree = diagonal_tree(200);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();

    for i in 0..199 {
        tree.remove(&(i, [i, i, i])).unwrap();
    }

    assert!(tree.count() == 1);
    assert!(tree.count_sub_space(&Bounds::none()) == 1);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}

#[test]
fn stepper_breaks_early() {
    let tree = diagonal_tree(100);

    let mut visited = 0;
    let status = tree.stepper(|_| {
        visited += 1;
        visited < 5
    });

    assert!(status == StepStatus::Break);
    assert!(visited == 5);

    // A visitor returning unit never breaks.
    assert!(tree.stepper(|_| ()) == StepStatus::Continue);
}

#[test]
fn items_on_division_boundary() {
    // Pin the division point so items sitting exactly on it exercise the
    // at-or-above routing rule through add, query and remove.
    let mut tree = OmnitreePoints::new((|item: &[i64; 1]| *item) as fn(&[i64; 1]) -> [i64; 1])
        .divide_on(0, DivisionStrategy::Custom(|_| 50));

    for i in 0..100 {
        tree.add([i]);
    }
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();

    assert!(tree.count_sub_space(&Bounds::from_min_max([50], [50])) == 1);
    assert!(tree.try_remove(&[50]));
    assert!(tree.count_sub_space(&Bounds::from_min_max([50], [50])) == 0);

    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}

#[test]
fn coincident_points_do_not_subdivide_forever() {
    let mut tree = OmnitreePoints::new((|item: &(usize, [i32; 2])| item.1) as fn(&(usize, [i32; 2])) -> [i32; 2]);

    // Far past any load threshold, all at one coordinate.
    for i in 0..1000 {
        tree.add((i, [7, 7]));
    }

    assert!(tree.count() == 1000);
    assert!(tree.count_sub_space(&Bounds::at_point([7, 7])) == 1000);
    assert!(tree.count_sub_space(&Bounds::at_point([8, 8])) == 0);

    for i in 0..1000 {
        assert!(tree.try_remove(&(i, [7, 7])));
    }
    assert!(tree.is_empty());
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}

#[test]
fn clear_resets_everything() {
    let mut tree = diagonal_tree(100);

    tree.clear();

    assert!(tree.count() == 0);
    assert!(tree.is_empty());
    assert!(tree.iter().next().is_none());
    assert!(tree.count_sub_space(&Bounds::none()) == 0);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();

    // The cleared tree accepts new items as if freshly constructed.
    tree.add((1, [1, 1, 1]));
    assert!(tree.count() == 1);
}

#[test]
fn update_relocates_moved_items() {
    use std::cell::Cell;

    let mut tree = OmnitreePoints::new(
        (|item: &(usize, Cell<i64>)| [item.1.get()]) as fn(&(usize, Cell<i64>)) -> [i64; 1],
    );
    for i in 0..100 {
        tree.add((i as usize, Cell::new(i)));
    }

    // Shift every even-id item far away, then re-place in bulk.
    tree.iter().for_each(|item| {
        if item.0 % 2 == 0 {
            item.1.set(item.1.get() + 1000);
        }
    });
    tree.update();

    assert!(tree.count() == 100);
    assert!(tree.count_sub_space(&Bounds::from_min_max([0], [99])) == 50);
    assert!(tree.count_sub_space(&Bounds::from_min_max([1000], [1099])) == 50);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}

#[test]
fn reversed_axis_ordering() {
    let mut tree = OmnitreePoints::new((|item: &[i64; 1]| *item) as fn(&[i64; 1]) -> [i64; 1])
        .compare_on(0, |a, b| b.cmp(a));

    for i in 0..100 {
        tree.add([i]);
    }
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();

    // Under the reversed ordering, "min 99, max 50" is a well-formed range.
    let range = Bounds::from_min_max([99], [50]);
    assert!(tree.count_sub_space(&range) == 50);

    for i in 0..100 {
        assert!(tree.try_remove(&[i]));
    }
    assert!(tree.is_empty());
}

#[test]
fn mean_division_strategy() {
    let mut tree = OmnitreePoints::new((|item: &[f64; 2]| *item) as fn(&[f64; 2]) -> [f64; 2])
        .divide_on(0, DivisionStrategy::Mean)
        .divide_on(1, DivisionStrategy::Mean);

    for i in 0..200 {
        tree.add([i as f64 * 0.5, i as f64 * -0.25]);
    }

    assert!(tree.count() == 200);
    assert!(tree.count_sub_space(&Bounds::from_min_max([0.0, -50.0], [99.5, 0.0])) == 200);
    assert!(tree.count_sub_space(&Bounds::from_min_max([0.0, -50.0], [49.5, 0.0])) == 100);
    tree.__debug_verify_tree_state()
        .map_err(|x| println!("{}", x))
        .unwrap();
}
