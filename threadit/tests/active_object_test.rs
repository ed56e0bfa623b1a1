// Integration tests for the active object runtime


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use test_helpers::{WAIT, echo, spawn_echo, wait_for_state};
use threadit::{
    ActiveObjectBuilder, BlockingQueue, ChannelCallback, DoneQueue, HandlerResult, LifecycleState,
    Message, NamedThreadFactory, Payload, ThreadFactory, WorkContext, WorkDone, WorkItem,
    WorkStatus,
};

#[test]
fn test_echo_round_trip() {
    let echo = spawn_echo("echo");
    let id = echo.submit(WorkItem::new(1).with_payload(String::from("hi")));

    let result = echo.await_result(WAIT).expect("echo result");
    assert_eq!(result.status(), WorkStatus::Ok);
    assert_eq!(result.id(), id);
    assert_eq!(result.instruction(), 1);
    assert_eq!(result.payload_ref::<String>().map(String::as_str), Some("hi"));
    assert_eq!(result.source().as_ref(), Some(&echo.handle()));

    echo.shutdown(WAIT).unwrap();
}

#[test]
fn test_unregistered_instruction_reports_no_method() {
    let echo = spawn_echo("no-method");
    echo.submit(WorkItem::new(7).with_payload(1u8));

    let result = echo.await_result(WAIT).unwrap();
    assert_eq!(result.status(), WorkStatus::NoMethod);
    assert_eq!(result.instruction(), 7);
    assert_eq!(result.payload_ref::<u8>(), Some(&1));
}

#[test]
fn test_out_of_range_instruction_reports_invalid() {
    let echo = spawn_echo("invalid");
    echo.submit(WorkItem::new(threadit::MAX_WORK_METHODS));
    echo.submit(WorkItem::new(u32::MAX));

    for _ in 0..2 {
        let result = echo.await_result(WAIT).unwrap();
        assert_eq!(result.status(), WorkStatus::InvalidInstruction);
    }
}

#[test]
fn test_handler_without_result_echoes_input() {
    let worker = ActiveObjectBuilder::<()>::new("no-result")
        .handler(3, |_, _, _| Ok(None))
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(3).with_payload(42i64));
    let result = worker.await_result(WAIT).unwrap();
    assert_eq!(result.status(), WorkStatus::NoResult);
    assert_eq!(result.payload_ref::<i64>(), Some(&42));
}

#[test]
fn test_thread_survives_failing_handlers() {
    let worker = ActiveObjectBuilder::<()>::new("survivor")
        .handler(1, echo)
        .unwrap()
        .handler(2, |_, _, _| Err(anyhow!("handler refused the work")))
        .unwrap()
        .handler(3, |_, _, _| panic!("handler blew up"))
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(2));
    worker.submit(WorkItem::new(3));
    worker.submit(WorkItem::new(1));

    assert_eq!(worker.await_result(WAIT).unwrap().status(), WorkStatus::Failed);
    assert_eq!(worker.await_result(WAIT).unwrap().status(), WorkStatus::Failed);
    assert_eq!(worker.await_result(WAIT).unwrap().status(), WorkStatus::Ok);
    assert_eq!(worker.state(), LifecycleState::Running);
}

#[test]
fn test_ids_increase() {
    let echo = spawn_echo("ids");
    let ids: Vec<_> = (0..5).map(|_| echo.submit(WorkItem::new(1))).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(ids[0] >= 1);
}

#[test]
fn test_items_processed_in_submission_order() {
    let worker = ActiveObjectBuilder::<Vec<u32>>::new("fifo")
        .handler(1, |seen: &mut Vec<u32>, _, item: &WorkItem| {
            seen.push(*item.payload_ref::<u32>().unwrap());
            Ok(None)
        })
        .unwrap()
        .spawn(Vec::new())
        .unwrap();

    for n in 0..20u32 {
        worker.submit(WorkItem::new(1).with_payload(n).without_queue_delivery());
    }
    let (callback, done) = ChannelCallback::unbounded();
    worker.submit(WorkItem::new(1).with_payload(20u32).with_callback(callback));
    done.recv_timeout(WAIT).unwrap();

    let seen = worker.shutdown(WAIT).unwrap();
    assert_eq!(seen, (0..=20).collect::<Vec<_>>());
}

struct Gate {
    order: Vec<u32>,
    started: flume::Sender<()>,
    release: flume::Receiver<()>,
}

#[test]
fn test_events_jump_queued_work() {
    let (started_tx, started_rx) = flume::unbounded();
    let (release_tx, release_rx) = flume::unbounded();
    let gate = Gate {
        order: Vec::new(),
        started: started_tx,
        release: release_rx,
    };

    let worker = ActiveObjectBuilder::<Gate>::new("events")
        .handler(1, |gate: &mut Gate, _, _| {
            gate.order.push(1);
            gate.started.send(()).unwrap();
            gate.release.recv_timeout(WAIT).unwrap();
            Ok(None)
        })
        .unwrap()
        .handler(2, |gate: &mut Gate, _, _| {
            gate.order.push(2);
            Ok(None)
        })
        .unwrap()
        .handler(3, |gate: &mut Gate, _, item: &WorkItem| {
            assert!(item.is_event());
            gate.order.push(3);
            Ok(None)
        })
        .unwrap()
        .spawn(gate)
        .unwrap();

    worker.submit(WorkItem::new(1));
    started_rx.recv_timeout(WAIT).unwrap();

    // The handler for 1 is now blocked; queue two normal items then an event.
    worker.submit(WorkItem::new(2));
    worker.submit(WorkItem::new(2));
    worker.notify_event(3, Some(Payload::new("alarm")));
    release_tx.send(()).unwrap();

    for _ in 0..4 {
        worker.await_result(WAIT).unwrap();
    }
    let gate = worker.shutdown(WAIT).unwrap();
    assert_eq!(gate.order, vec![1, 3, 2, 2]);
}

#[test]
fn test_periodic_handler_ticks_without_work() {
    let (callback, ticks) = ChannelCallback::unbounded();
    let worker = ActiveObjectBuilder::<usize>::new("ticker")
        .period(Duration::from_millis(40))
        .periodic(|count: &mut usize, _, _| {
            *count += 1;
            Ok(None)
        })
        .periodic_callback(callback)
        .spawn(0)
        .unwrap();

    let first = ticks.recv_timeout(WAIT).unwrap();
    let second = ticks.recv_timeout(WAIT).unwrap();
    assert_eq!(first.thread_name, "ticker");
    assert!(second.work_id > first.work_id);

    // Periodic results are callback-only.
    assert!(worker.await_result(Duration::from_millis(50)).is_none());

    let count = worker.shutdown(WAIT).unwrap();
    assert!(count >= 2);
}

#[test]
fn test_periodic_cadence_follows_period() {
    const PERIOD: Duration = Duration::from_millis(50);

    let (callback, ticks) = ChannelCallback::unbounded();
    let worker = ActiveObjectBuilder::<()>::new("cadence")
        .period(PERIOD)
        .periodic(|_, _, _| Ok(None))
        .periodic_callback(callback)
        .spawn(())
        .unwrap();

    // Ten periods; at least one tick per two periods is expected even on a
    // loaded machine.
    thread::sleep(PERIOD * 10);
    let count = ticks.try_iter().count();
    assert!(count >= 5, "only {} ticks in {:?} at period {:?}", count, PERIOD * 10, PERIOD);

    worker.shutdown(WAIT).unwrap();
}

#[test]
fn test_periodic_ticks_never_overlap_work() {
    let worker = ActiveObjectBuilder::<Vec<&'static str>>::new("interleave")
        .period(Duration::from_millis(10))
        .periodic(|log: &mut Vec<&'static str>, _, _| {
            log.push("tick");
            Ok(None)
        })
        .handler(1, |log: &mut Vec<&'static str>, _, _| {
            log.push("start");
            thread::sleep(Duration::from_millis(60));
            log.push("end");
            Ok(None)
        })
        .unwrap()
        .spawn(Vec::new())
        .unwrap();

    for _ in 0..3 {
        worker.submit(WorkItem::new(1));
    }
    for _ in 0..3 {
        worker.await_result(WAIT).unwrap();
    }
    thread::sleep(Duration::from_millis(50));

    let log = worker.shutdown(WAIT).unwrap();
    assert!(log.contains(&"tick"));
    for (i, entry) in log.iter().enumerate() {
        if *entry == "start" {
            assert_eq!(log[i + 1], "end", "tick interleaved with work: {:?}", log);
        }
    }
}

#[test]
fn test_set_period_wakes_idle_loop() {
    let (callback, ticks) = ChannelCallback::unbounded();
    let worker = ActiveObjectBuilder::<()>::new("late-ticker")
        .period(Duration::ZERO)
        .periodic(|_, _, _| Ok(None))
        .periodic_callback(callback)
        .spawn(())
        .unwrap();

    assert!(wait_for_state(&worker, LifecycleState::Running, WAIT));
    assert_eq!(worker.period(), None);
    assert!(ticks.recv_timeout(Duration::from_millis(100)).is_err());

    worker.set_period(Duration::from_millis(30));
    assert_eq!(worker.period(), Some(Duration::from_millis(30)));
    ticks.recv_timeout(WAIT).unwrap();

    worker.set_period(Duration::ZERO);
    thread::sleep(Duration::from_millis(100));
    while ticks.try_recv().is_ok() {}
    assert!(ticks.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_handler_can_change_period() {
    let (callback, ticks) = ChannelCallback::unbounded();
    let worker = ActiveObjectBuilder::<()>::new("self-tuning")
        .period(Duration::ZERO)
        .periodic(|_, _, _| Ok(None))
        .periodic_callback(callback)
        .handler(1, |_, ctx: &mut WorkContext<'_>, _| {
            ctx.set_period(Duration::from_millis(20));
            Ok(None)
        })
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(1));
    worker.await_result(WAIT).unwrap();
    ticks.recv_timeout(WAIT).unwrap();
}

#[test]
fn test_callback_delivery_without_queue() {
    let echo = spawn_echo("cb-test");
    let (callback, done) = ChannelCallback::unbounded();

    let id = echo.submit(
        WorkItem::new(1)
            .with_callback(callback)
            .without_queue_delivery(),
    );

    assert_eq!(
        done.recv_timeout(WAIT).unwrap(),
        WorkDone {
            thread_name: "cb-test".to_string(),
            work_id: id
        }
    );
    assert!(echo.await_result(Duration::from_millis(50)).is_none());
}

#[test]
fn test_custom_done_queue() {
    let echo = spawn_echo("custom-queue");
    let queue: DoneQueue = Arc::new(BlockingQueue::new());

    let id = echo.submit(WorkItem::new(1).with_done_queue(&queue));
    let result = queue.poll(WAIT).unwrap();
    assert_eq!(result.id(), id);
    assert!(echo.done_queue().is_empty());
}

#[test]
fn test_dropped_done_queue_still_notifies_callback() {
    let echo = spawn_echo("dropped-queue");
    let queue: DoneQueue = Arc::new(BlockingQueue::new());
    let (callback, done) = ChannelCallback::unbounded();
    let item = WorkItem::new(1)
        .with_done_queue(&queue)
        .with_callback(callback);
    drop(queue);

    let id = echo.submit(item);
    assert_eq!(done.recv_timeout(WAIT).unwrap().work_id, id);
    assert!(echo.await_result(Duration::from_millis(50)).is_none());
}

#[test]
fn test_panicking_callback_is_contained() {
    let echo = spawn_echo("bad-callback");
    fn explode(_: &str, _: u64) {
        panic!("callback failed");
    }

    echo.submit(WorkItem::new(1).with_callback(Arc::new(explode)));
    // Queue delivery happens before the callback runs.
    assert_eq!(echo.await_result(WAIT).unwrap().status(), WorkStatus::Ok);

    echo.submit(WorkItem::new(1));
    assert_eq!(echo.await_result(WAIT).unwrap().status(), WorkStatus::Ok);
}

#[test]
fn test_reply_between_two_objects() {
    let a = ActiveObjectBuilder::<()>::new("a")
        .handler(2, echo)
        .unwrap()
        .spawn(())
        .unwrap();
    let b = ActiveObjectBuilder::<()>::new("b")
        .handler(1, |_, ctx: &mut WorkContext<'_>, item: &WorkItem| {
            ctx.reply(item, item.payload().cloned());
            Ok(None)
        })
        .unwrap()
        .spawn(())
        .unwrap();

    let mut message = Message::new(1).with_payload("ping");
    message.set_source(&a, 2);
    message.send_to(&b);

    let reply = a.await_result(WAIT).expect("reply processed by a");
    assert_eq!(reply.instruction(), 2);
    assert_eq!(reply.status(), WorkStatus::Ok);
    assert_eq!(reply.payload_ref::<&str>(), Some(&"ping"));

    // b's own result for the request lands on b's done queue.
    assert_eq!(b.await_result(WAIT).unwrap().instruction(), 1);
}

#[test]
fn test_reply_to_dead_object_is_silent() {
    let a = spawn_echo("short-lived");
    let weak_a = a.downgrade();
    let b = ActiveObjectBuilder::<Option<u64>>::new("replier")
        .handler(1, |sent: &mut Option<u64>, ctx: &mut WorkContext<'_>, item: &WorkItem| {
            *sent = ctx.reply(item, None);
            Ok(None)
        })
        .unwrap()
        .spawn(None)
        .unwrap();

    let request = WorkItem::new(1).with_reply_to(&a, 1);
    a.shutdown(WAIT).unwrap();
    assert!(!weak_a.is_alive());

    b.submit(request);
    b.await_result(WAIT).unwrap();
    assert_eq!(b.shutdown(WAIT).unwrap(), None);
}

#[test]
fn test_time_budget_is_advisory() {
    let worker = ActiveObjectBuilder::<()>::new("budget")
        .handler(1, |_, ctx: &mut WorkContext<'_>, item: &WorkItem| {
            thread::sleep(Duration::from_millis(40));
            let status = if ctx.has_time_remaining() {
                WorkStatus::Ok
            } else {
                WorkStatus::Timeout
            };
            Ok(Some(item.clone().with_status(status)))
        })
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(1).with_time_budget(Duration::from_millis(10)));
    let late = worker.await_result(WAIT).unwrap();
    assert_eq!(late.status(), WorkStatus::Timeout);
    assert!(late.elapsed() >= Duration::from_millis(40));

    worker.submit(WorkItem::new(1));
    assert_eq!(worker.await_result(WAIT).unwrap().status(), WorkStatus::Ok);
}

#[test]
fn test_handler_sends_several_responses() {
    let worker = ActiveObjectBuilder::<()>::new("chatty")
        .handler(1, |_, ctx: &mut WorkContext<'_>, item: &WorkItem| -> HandlerResult {
            for step in 0..2 {
                ctx.send_response(item.clone().with_status(WorkStatus::User(150 + step)));
            }
            Ok(Some(item.clone()))
        })
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(1));
    let statuses: Vec<_> = (0..3)
        .map(|_| worker.await_result(WAIT).unwrap().status())
        .collect();
    assert_eq!(
        statuses,
        vec![WorkStatus::User(150), WorkStatus::User(151), WorkStatus::Ok]
    );
}

#[test]
fn test_parameter_checks_in_handler() {
    let worker = ActiveObjectBuilder::<()>::new("doubler")
        .handler(1, |_, _, item: &WorkItem| {
            let check = item.expect_payload::<u32>(true);
            match check.payload {
                Some(value) => Ok(Some(check.work_done.with_payload(*value * 2))),
                None => Ok(Some(check.work_done)),
            }
        })
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(1).with_payload(21u32));
    let doubled = worker.await_result(WAIT).unwrap();
    assert_eq!(doubled.status(), WorkStatus::Ok);
    assert_eq!(doubled.payload_ref::<u32>(), Some(&42));

    worker.submit(WorkItem::new(1));
    assert_eq!(
        worker.await_result(WAIT).unwrap().status(),
        WorkStatus::ParamObjectNull
    );
}

#[test]
fn test_stop_and_wait_for_stop() {
    let echo = spawn_echo("stopper");
    let handle = echo.handle();
    assert!(wait_for_state(&handle, LifecycleState::Running, WAIT));
    assert!(!handle.wait_for_stop(Duration::from_millis(20)));

    handle.stop();
    assert!(handle.is_stop_requested());
    assert!(handle.wait_for_stop(WAIT));
    assert_eq!(handle.state(), LifecycleState::Stopped);

    // Every waiter observes the exit.
    assert!(handle.wait_for_stop(Duration::from_millis(10)));
    assert!(echo.handle().wait_for_stop(Duration::from_millis(10)));
}

#[test]
fn test_stop_lets_running_handler_finish() {
    let (started_tx, started_rx) = flume::unbounded();
    let worker = ActiveObjectBuilder::<flume::Sender<()>>::new("finisher")
        .handler(1, |started: &mut flume::Sender<()>, _, item: &WorkItem| {
            started.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            Ok(Some(item.clone()))
        })
        .unwrap()
        .spawn(started_tx)
        .unwrap();

    worker.submit(WorkItem::new(1));
    worker.submit(WorkItem::new(1));
    started_rx.recv_timeout(WAIT).unwrap();
    worker.stop();

    assert!(worker.wait_for_stop(WAIT));
    assert_eq!(worker.await_result(WAIT).unwrap().status(), WorkStatus::Ok);
    // The second item was never started.
    assert!(worker.await_result(Duration::from_millis(20)).is_none());
    assert!(!worker.work_queue().is_empty());
}

#[test]
fn test_dropping_owner_stops_thread() {
    let echo = spawn_echo("dropped");
    let handle = echo.handle();
    drop(echo);

    assert!(handle.wait_for_stop(WAIT));
    assert_eq!(handle.state(), LifecycleState::Stopped);
}

#[test]
fn test_shutdown_returns_state() {
    let worker = ActiveObjectBuilder::<u64>::new("summer")
        .handler(1, |sum: &mut u64, _, item: &WorkItem| {
            *sum += item.payload_ref::<u64>().copied().unwrap_or(0);
            Ok(None)
        })
        .unwrap()
        .spawn(0)
        .unwrap();

    for n in 1..=4u64 {
        worker.submit(WorkItem::new(1).with_payload(n));
    }
    for _ in 0..4 {
        worker.await_result(WAIT).unwrap();
    }
    assert_eq!(worker.shutdown(WAIT).unwrap(), 10);
}

struct CountingFactory {
    inner: NamedThreadFactory,
    spawned: AtomicUsize,
}

impl ThreadFactory for CountingFactory {
    fn spawn(
        &self,
        name: Option<String>,
        job: threadit::spawn::Job,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(name, job)
    }
}

#[test]
fn test_injected_thread_factory() {
    let factory = Arc::new(CountingFactory {
        inner: NamedThreadFactory::new("injected"),
        spawned: AtomicUsize::new(0),
    });

    let worker = ActiveObjectBuilder::<()>::new("factory-made")
        .thread_factory(factory.clone())
        .handler(1, |_, _, item: &WorkItem| {
            let name = thread::current().name().map(str::to_string);
            Ok(Some(item.clone().with_payload(name)))
        })
        .unwrap()
        .spawn(())
        .unwrap();

    worker.submit(WorkItem::new(1));
    let result = worker.await_result(WAIT).unwrap();
    assert_eq!(
        result.payload_ref::<Option<String>>(),
        Some(&Some("threadit-worker-factory-made".to_string()))
    );
    assert_eq!(factory.spawned.load(Ordering::SeqCst), 1);
}

fn thread_name_handler(_: &mut (), _: &mut WorkContext<'_>, item: &WorkItem) -> HandlerResult {
    let name = thread::current().name().map(str::to_string);
    Ok(Some(item.clone().with_payload(name)))
}

#[test]
fn test_thread_name_uses_configured_prefix() {
    let prefixed = ActiveObjectBuilder::<()>::new("obj")
        .thread_name_prefix("custom-prefix")
        .handler(1, thread_name_handler)
        .unwrap()
        .spawn(())
        .unwrap();
    let bare = ActiveObjectBuilder::<()>::new("obj")
        .thread_name_prefix("")
        .handler(1, thread_name_handler)
        .unwrap()
        .spawn(())
        .unwrap();

    prefixed.submit(WorkItem::new(1));
    bare.submit(WorkItem::new(1));
    assert_eq!(
        prefixed.await_result(WAIT).unwrap().payload_ref::<Option<String>>(),
        Some(&Some("custom-prefix-obj".to_string()))
    );
    assert_eq!(
        bare.await_result(WAIT).unwrap().payload_ref::<Option<String>>(),
        Some(&Some("obj".to_string()))
    );
    // The object's own name is unaffected.
    assert_eq!(prefixed.name(), "obj");
}

#[test]
fn test_await_result_times_out() {
    let echo = spawn_echo("idle");
    let start = Instant::now();
    assert!(echo.await_result(Duration::from_millis(50)).is_none());
    assert!(start.elapsed() >= Duration::from_millis(50));
}
