use std::error::Error;
use std::thread;
use std::time::Duration;

use threadit::logging;
use threadit::sync::signals;
use threadit::{ActiveObjectBuilder, ChannelCallback, WaitForObjects, WaitResult, WorkItem};

const SAMPLE: u32 = 1;

#[derive(Default)]
struct Sampler {
    ticks: u64,
    samples: Vec<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_development();

    let (tick_callback, ticks) = ChannelCallback::unbounded();
    let sampler = ActiveObjectBuilder::<Sampler>::new("sampler")
        .period(Duration::from_millis(100))
        .periodic(|state: &mut Sampler, _, _| {
            state.ticks += 1;
            Ok(None)
        })
        .periodic_callback(tick_callback)
        .handler(SAMPLE, |state: &mut Sampler, _, item: &WorkItem| {
            let value = item.payload_ref::<u64>().copied().unwrap_or_default();
            state.samples.push(value);
            Ok(Some(item.clone().with_payload(state.samples.len())))
        })?
        .spawn(Sampler::default())?;

    // Two producers each raise a signal once they have submitted their samples.
    let done = signals(2);
    let producers: Vec<_> = done
        .iter()
        .enumerate()
        .map(|(index, signal)| {
            let sampler = sampler.handle();
            let signal = signal.clone();
            thread::spawn(move || {
                for n in 0..3u64 {
                    let sample = WorkItem::new(SAMPLE)
                        .with_payload(index as u64 * 10 + n)
                        .without_queue_delivery();
                    sampler.submit(sample);
                    thread::sleep(Duration::from_millis(40));
                }
                signal.release();
            })
        })
        .collect();

    match WaitForObjects::wait_all_of(&done, Duration::from_secs(2)) {
        WaitResult::Succeeded(last) => println!("all producers finished, producer {} last", last),
        other => println!("producers did not finish: {:?}", other),
    }
    for producer in producers {
        let _ = producer.join();
    }

    sampler.set_period(Duration::from_millis(50));
    thread::sleep(Duration::from_millis(300));
    let notices = ticks.drain().count();

    let state = sampler.shutdown(Duration::from_secs(1))?;
    println!(
        "{} ticks ({} notified), {} samples: {:?}",
        state.ticks,
        notices,
        state.samples.len(),
        state.samples
    );
    Ok(())
}
