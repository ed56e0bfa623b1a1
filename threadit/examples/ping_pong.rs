use std::error::Error;
use std::time::Duration;

use threadit::logging;
use threadit::{ActiveObjectBuilder, Message, WorkContext, WorkItem};

const PING: u32 = 1;
const PONG: u32 = 2;
const ROUNDS: u32 = 5;

// Pinger state: how many pongs have come back.
struct Pinger {
    received: u32,
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_development();

    let ponger = ActiveObjectBuilder::<u32>::new("ponger")
        .handler(PING, |served: &mut u32, ctx: &mut WorkContext<'_>, item: &WorkItem| {
            *served += 1;
            let round = item.payload_ref::<u32>().copied().unwrap_or_default();
            println!("{} got ping {}", ctx.name(), round);
            ctx.reply(item, item.payload().cloned());
            Ok(None)
        })?
        .spawn(0)?;

    let pinger = ActiveObjectBuilder::<Pinger>::new("pinger")
        .handler(PONG, |state: &mut Pinger, ctx: &mut WorkContext<'_>, item: &WorkItem| {
            state.received += 1;
            let round = item.payload_ref::<u32>().copied().unwrap_or_default();
            println!("{} got pong {}", ctx.name(), round);
            Ok(Some(item.clone()))
        })?
        .spawn(Pinger { received: 0 })?;

    for round in 1..=ROUNDS {
        let mut ping = Message::new(PING).with_payload(round);
        ping.set_source(&pinger, PONG);
        ping.send_with_no_reply_to(&ponger);

        match pinger.await_result(Duration::from_secs(1)) {
            Some(pong) => println!("round {} finished with {}", round, pong.status()),
            None => println!("round {} timed out", round),
        }
    }

    let pinger_state = pinger.shutdown(Duration::from_secs(1))?;
    let served = ponger.shutdown(Duration::from_secs(1))?;
    println!("pinger received {} pongs, ponger served {} pings", pinger_state.received, served);
    Ok(())
}
