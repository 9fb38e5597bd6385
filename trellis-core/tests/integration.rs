//! Integration Tests for the Reactive System
//!
//! These tests verify that refs, reactive objects, computeds, effects and
//! the scheduler work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::reactive::{
    computed, effect, effect_with_options, reactive, ref_, watch, EffectOptions, Object, Ref,
    Value, WatchOptions,
};
use trellis_core::scheduler::{flush_jobs, has_pending_flush, queue_job, Job};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// Wrapping the same object twice yields the same wrapper, and wrapping a
/// wrapper's raw target yields it again.
#[test]
fn reactive_wrapping_is_idempotent() {
    let target: Object = [("a", 1)].into_iter().collect();
    let first = reactive(&target);
    let second = reactive(&target);
    assert!(first.ptr_eq(&second));
    assert!(reactive(&first.to_raw()).ptr_eq(&first));

    // A ref of a ref is the same ref.
    let count = ref_(1);
    let again: Ref<i32> = ref_(count.clone());
    assert!(again.ptr_eq(&count));
}

/// Writing NaN over NaN is not a change; writing -0.0 over 0.0 is.
#[test]
fn same_value_equality_suppresses_nan_writes() {
    let value = ref_(f64::NAN);
    let runs = counter();
    let _e = effect({
        let (value, runs) = (value.clone(), runs.clone());
        move || {
            value.get();
            runs.set(runs.get() + 1);
        }
    });

    assert!(!value.set(f64::NAN));
    assert_eq!(runs.get(), 1);

    assert!(value.set(0.0));
    assert!(value.set(-0.0));
    assert_eq!(runs.get(), 3);
}

/// Reading a computed twice without an intervening write evaluates once.
#[test]
fn computed_memoizes_between_writes() {
    let count = ref_(2);
    let evaluations = counter();
    let squared = computed({
        let (count, evaluations) = (count.clone(), evaluations.clone());
        move || {
            evaluations.set(evaluations.get() + 1);
            count.get() * count.get()
        }
    });

    assert_eq!(squared.get(), 4);
    assert_eq!(squared.get(), 4);
    assert_eq!(evaluations.get(), 1);

    count.set(3);
    assert_eq!(evaluations.get(), 1);
    assert_eq!(squared.get(), 9);
    assert_eq!(evaluations.get(), 2);
}

/// Three writes to three tracked properties produce one effect run at the
/// next flush.
#[test]
fn writes_are_batched_until_flush() {
    let state = reactive(&[("a", 0), ("b", 0), ("c", 0)].into_iter().collect());
    let runs = counter();
    let sum = Rc::new(Cell::new(0.0));

    let job_slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
    let eff = effect_with_options(
        {
            let (state, runs, sum) = (state.clone(), runs.clone(), sum.clone());
            move || {
                runs.set(runs.get() + 1);
                let total: f64 = ["a", "b", "c"]
                    .iter()
                    .filter_map(|key| state.get(key).as_number())
                    .sum();
                sum.set(total);
            }
        },
        EffectOptions::new().with_scheduler({
            let job_slot = job_slot.clone();
            move || {
                if let Some(job) = job_slot.borrow().as_ref() {
                    queue_job(job);
                }
            }
        }),
    );
    *job_slot.borrow_mut() = Some(Job::new({
        let eff = eff.clone();
        move || eff.run()
    }));
    assert_eq!(runs.get(), 1);

    state.set("a", 1);
    state.set("b", 2);
    state.set("c", 3);
    assert_eq!(runs.get(), 1);
    assert!(has_pending_flush());

    let report = flush_jobs();
    assert_eq!(report.ran, 1);
    assert_eq!(runs.get(), 2);
    assert_eq!(sum.get(), 6.0);
}

/// An effect that stops reading a branch is no longer triggered by it.
#[test]
fn effects_drop_stale_branches() {
    let show = ref_(true);
    let detail = ref_(String::from("x"));
    let runs = counter();
    let _e = effect({
        let (show, detail, runs) = (show.clone(), detail.clone(), runs.clone());
        move || {
            runs.set(runs.get() + 1);
            if show.get() {
                detail.get();
            }
        }
    });

    show.set(false);
    assert_eq!(runs.get(), 2);

    detail.set("y".into());
    assert_eq!(runs.get(), 2);
}

/// A stopped effect never runs again.
#[test]
fn stopped_effect_is_inert() {
    let count = ref_(0);
    let runs = counter();
    let e = effect({
        let (count, runs) = (count.clone(), runs.clone());
        move || {
            count.get();
            runs.set(runs.get() + 1);
        }
    });

    e.stop();
    count.set(1);
    assert_eq!(runs.get(), 1);
    assert_eq!(count.subscriber_count(), 0);
}

/// Watch on a nested reactive object sees deep writes.
#[test]
fn deep_watch_on_nested_object() {
    let inner: Object = [("n", 1)].into_iter().collect();
    let outer: Object = [("inner", Value::from(inner))].into_iter().collect();
    let state = reactive(&outer);
    let calls = counter();

    let handle = watch(
        &state,
        {
            let calls = calls.clone();
            move |_: &Value, _: Option<&Value>| calls.set(calls.get() + 1)
        },
        WatchOptions::new(),
    );

    let nested = state.get("inner").as_reactive().expect("nested object");
    nested.set("n", 2);
    flush_jobs();
    assert_eq!(calls.get(), 1);

    handle.stop();
    nested.set("n", 3);
    flush_jobs();
    assert_eq!(calls.get(), 1);
}

/// A computed chain feeding an effect settles on the final value.
#[test]
fn computed_chain_feeds_effect() {
    let price = ref_(10.0);
    let quantity = ref_(2.0);
    let subtotal = computed({
        let (price, quantity) = (price.clone(), quantity.clone());
        move || price.get() * quantity.get()
    });
    let total = computed({
        let subtotal = subtotal.clone();
        move || subtotal.get() * 1.5
    });

    let seen = Rc::new(Cell::new(0.0));
    let _e = effect({
        let (total, seen) = (total.clone(), seen.clone());
        move || seen.set(total.get())
    });
    assert_eq!(seen.get(), 30.0);

    quantity.set(4.0);
    assert_eq!(seen.get(), 60.0);
    assert_eq!(subtotal.evaluations(), 2);
}
