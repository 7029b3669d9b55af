use super::*;

fn cmp2() -> [Compare<i32>; 2] {
    [default_compare::<i32>; 2]
}

#[test]
fn bound_conversions() {
    assert!(Bound::<i32>::default() == Bound::None);
    assert!(Bound::from(Some(3)).value() == Some(&3));
    assert!(Bound::<i32>::from(None).value() == None);
    assert!(Bound::Value(0).is_some());
    assert!(!Bound::<i32>::None.is_some());
}

#[test]
fn contains_is_inclusive_and_open_sides_pass() {
    let bounds = Bounds::from_min_max([0, 0], [10, 10]);
    let compare = cmp2();

    assert!(bounds.contains(&[0, 0], &compare));
    assert!(bounds.contains(&[10, 10], &compare));
    assert!(bounds.contains(&[5, 5], &compare));
    assert!(!bounds.contains(&[-1, 5], &compare));
    assert!(!bounds.contains(&[5, 11], &compare));

    // An open side never disqualifies.
    let half_open = Bounds::new([Bound::Value(0), Bound::None], [Bound::None, Bound::Value(10)]);
    assert!(half_open.contains(&[i32::MAX, i32::MIN], &compare));
    assert!(!half_open.contains(&[-1, 0], &compare));

    assert!(Bounds::none().contains(&[i32::MIN, i32::MAX], &compare));
}

#[test]
fn child_region_bit_semantics() {
    let parent = Bounds::<i32, 2>::none();
    let division = [3, 7];

    // Bit set on an axis pins the min side to the division point; bit clear
    // pins the max side.
    let low_low = parent.child(&division, 0b00);
    assert!(low_low.min() == &[Bound::None, Bound::None]);
    assert!(low_low.max() == &[Bound::Value(3), Bound::Value(7)]);

    let high_low = parent.child(&division, 0b01);
    assert!(high_low.min() == &[Bound::Value(3), Bound::None]);
    assert!(high_low.max() == &[Bound::None, Bound::Value(7)]);

    let high_high = parent.child(&division, 0b11);
    assert!(high_high.min() == &[Bound::Value(3), Bound::Value(7)]);
    assert!(high_high.max() == &[Bound::None, Bound::None]);

    // Splitting a child again narrows, never widens.
    let nested = high_high.child(&[5, 9], 0b00);
    assert!(nested.min() == &[Bound::Value(3), Bound::Value(7)]);
    assert!(nested.max() == &[Bound::Value(5), Bound::Value(9)]);
}

#[test]
fn inclusion() {
    let compare = cmp2();
    let a = Bounds::from_min_max([0, 0], [10, 10]);

    assert!(inclusion_check(&a, &Bounds::from_min_max([5, 5], [15, 15]), &compare));
    // Shared edges count as overlap.
    assert!(inclusion_check(&a, &Bounds::from_min_max([10, 0], [20, 10]), &compare));
    assert!(!inclusion_check(&a, &Bounds::from_min_max([11, 0], [20, 10]), &compare));
    // Disjoint on one axis is disjoint, full stop.
    assert!(!inclusion_check(&a, &Bounds::from_min_max([0, 20], [10, 30]), &compare));

    // Open sides cannot rule an overlap out.
    assert!(inclusion_check(&a, &Bounds::none(), &compare));
    let above = Bounds::new([Bound::Value(11), Bound::None], [Bound::None; 2]);
    assert!(!inclusion_check(&a, &above, &compare));
}

#[test]
fn encapsulation() {
    let compare = cmp2();
    let inner = Bounds::from_min_max([2, 2], [8, 8]);

    assert!(encapsulation_check(&inner, &Bounds::from_min_max([0, 0], [10, 10]), &compare));
    // Exact cover counts.
    assert!(encapsulation_check(&inner, &inner, &compare));
    // Poking out on any side fails.
    assert!(!encapsulation_check(&inner, &Bounds::from_min_max([3, 0], [10, 10]), &compare));
    assert!(!encapsulation_check(&inner, &Bounds::from_min_max([0, 0], [10, 7]), &compare));

    // Openness must match side for side: a bounded box inside an open outer
    // cannot be certified, nor an open box inside a bounded outer.
    assert!(!encapsulation_check(&inner, &Bounds::none(), &compare));
    assert!(!encapsulation_check(
        &Bounds::none(),
        &Bounds::from_min_max([0, 0], [10, 10]),
        &compare
    ));
    assert!(encapsulation_check(&Bounds::<i32, 2>::none(), &Bounds::none(), &compare));
}

#[test]
fn equals() {
    let compare = cmp2();
    assert!(equals_check(&[1, 2], &[1, 2], &compare));
    assert!(!equals_check(&[1, 2], &[2, 1], &compare));

    // The caller's comparer decides equality, not `PartialEq`.
    let everything_equal: [Compare<i32>; 2] = [|_, _| std::cmp::Ordering::Equal; 2];
    assert!(equals_check(&[1, 2], &[9, 9], &everything_equal));
}

#[test]
fn straddles() {
    let compare = cmp2();
    let division = [5, 5];

    // Crossing the hyperplane on either axis straddles.
    assert!(straddles_lines(&Bounds::from_min_max([4, 0], [6, 1]), &division, &compare));
    assert!(straddles_lines(&Bounds::from_min_max([0, 4], [1, 6]), &division, &compare));
    // Touching it does too; the box cannot be routed strictly to one side.
    assert!(straddles_lines(&Bounds::from_min_max([5, 0], [6, 1]), &division, &compare));
    assert!(straddles_lines(&Bounds::from_min_max([0, 0], [5, 1]), &division, &compare));
    // Strictly to one side on every axis: no straddle.
    assert!(!straddles_lines(&Bounds::from_min_max([6, 6], [8, 8]), &division, &compare));
    assert!(!straddles_lines(&Bounds::from_min_max([0, 6], [4, 8]), &division, &compare));

    // An open side reaches across every hyperplane.
    let open_above = Bounds::new([Bound::Value(6), Bound::Value(6)], [Bound::None; 2]);
    assert!(!straddles_lines(&open_above, &division, &compare));
    let open_below = Bounds::new([Bound::None; 2], [Bound::Value(6), Bound::Value(6)]);
    assert!(straddles_lines(&open_below, &division, &compare));
}

#[test]
fn same_as_respects_comparer() {
    let compare = cmp2();
    let a = Bounds::from_min_max([1, 2], [3, 4]);

    assert!(a.same_as(&Bounds::from_min_max([1, 2], [3, 4]), &compare));
    assert!(!a.same_as(&Bounds::from_min_max([1, 2], [3, 5]), &compare));
    // Openness is part of the identity.
    assert!(!a.same_as(&Bounds::new([Bound::Value(1), Bound::Value(2)], [Bound::Value(3), Bound::None]), &compare));

    let everything_equal: [Compare<i32>; 2] = [|_, _| std::cmp::Ordering::Equal; 2];
    assert!(a.same_as(&Bounds::from_min_max([9, 9], [9, 9]), &everything_equal));
}

#[test]
fn number_f64_round_trip() {
    assert!(<i32 as NumberCommon>::from_f64(3.7) == 3);
    assert!(3.5f32.to_f64() == 3.5);
    assert!(i32::MINVALUE == i32::MIN);
    assert!(u8::MAXVALUE == u8::MAX);
}
