//! Small command-line front end over the library's core scenarios, for
//! poking at the runtime by hand rather than through `tests/scenarios.rs`.

use clap::{Parser, Subcommand};
use corowheel::{create, resume, Condvar, Mutex, MutexKind, Passed, ResumeOutcome, Status};

#[derive(Parser, Debug)]
#[command(name = "corowheel-cli", about = "Poke at the corowheel runtime by hand")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ping-pong pair a fixed number of rounds and print each value.
    PingPong {
        #[arg(long, default_value_t = 6)]
        rounds: usize,
    },
    /// Demonstrate recursive-mutex contention between two coroutines.
    Mutex,
    /// Demonstrate condvar broadcast wakeup across three waiters.
    Broadcast,
}

fn main() {
    env_logger::init();
    match Cli::parse().command {
        Command::PingPong { rounds } => ping_pong(rounds),
        Command::Mutex => mutex_demo(),
        Command::Broadcast => broadcast_demo(),
    }
}

fn passed_i64(p: Passed) -> i64 {
    match p {
        Passed::Data(ptr) => ptr as usize as i64,
        _ => 0,
    }
}

fn i64_passed(n: i64) -> Passed {
    Passed::Data(n as usize as *mut u8)
}

fn bump(mut arg: Passed) -> Passed {
    loop {
        let n = passed_i64(arg);
        arg = corowheel::yield_now(i64_passed(n + 1));
    }
}

fn ping_pong(rounds: usize) {
    let p = create(bump).expect("create P");
    let c = create(bump).expect("create C");
    let mut next = 0i64;
    for i in 0..rounds {
        let target = if i % 2 == 0 { p } else { c };
        match resume(target, i64_passed(next)) {
            ResumeOutcome::Value(v) => {
                next = passed_i64(v);
                println!("round {i}: {} -> {next}", if i % 2 == 0 { 'P' } else { 'C' });
            }
            ResumeOutcome::NotResumable => println!("round {i}: target not resumable"),
        }
    }
}

fn mutex_ptr_from(arg: Passed) -> *const Mutex {
    match arg {
        Passed::Data(p) => p as *const Mutex,
        _ => panic!("expected a mutex pointer"),
    }
}

fn status_passed(s: Status) -> Passed {
    Passed::Data((s as i32 as usize) as *mut u8)
}

fn holder(arg: Passed) -> Passed {
    let mtx = unsafe { &*mutex_ptr_from(arg) };
    mtx.lock();
    mtx.lock();
    mtx.lock();
    println!("A: locked 3x");
    mtx.unlock();
    mtx.unlock();
    println!("A: unlocked 2x, still holding");
    corowheel::yield_now(Passed::Nothing);
    mtx.unlock();
    println!("A: unlocked final level, fully released");
    Passed::Nothing
}

fn prober(arg: Passed) -> Passed {
    let mtx = unsafe { &*mutex_ptr_from(arg) };
    let first = mtx.trylock();
    println!("B: first trylock -> {first:?}");
    corowheel::yield_now(status_passed(first));
    let second = mtx.trylock();
    println!("B: second trylock -> {second:?}");
    status_passed(second)
}

fn mutex_demo() {
    let mtx = Mutex::new(MutexKind::RECURSIVE_KIND);
    let mtx_ptr = &mtx as *const Mutex as *mut u8;
    let a = create(holder).expect("create A");
    let b = create(prober).expect("create B");
    resume(a, Passed::Data(mtx_ptr));
    resume(b, Passed::Data(mtx_ptr));
    resume(a, Passed::Nothing);
    resume(b, Passed::Nothing);
}

struct Shared {
    mtx: Mutex,
    cv: Condvar,
}

fn shared_from(arg: Passed) -> *const Shared {
    match arg {
        Passed::Data(p) => p as *const Shared,
        _ => panic!("expected a Shared pointer"),
    }
}

fn waiter(name: &'static str, arg: Passed) -> Passed {
    let shared = unsafe { &*shared_from(arg) };
    shared.mtx.lock();
    let status = shared.cv.wait(&shared.mtx);
    shared.mtx.unlock();
    println!("{name}: wait() -> {status:?}");
    status_passed(status)
}

fn waiter1(arg: Passed) -> Passed {
    waiter("W1", arg)
}
fn waiter2(arg: Passed) -> Passed {
    waiter("W2", arg)
}
fn waiter3(arg: Passed) -> Passed {
    waiter("W3", arg)
}

fn broadcast_demo() {
    let shared = Shared { mtx: Mutex::new(MutexKind::PLAIN), cv: Condvar::new() };
    let shared_ptr = &shared as *const Shared as *mut u8;
    let w1 = create(waiter1).expect("create W1");
    let w2 = create(waiter2).expect("create W2");
    let w3 = create(waiter3).expect("create W3");
    resume(w1, Passed::Data(shared_ptr));
    resume(w2, Passed::Data(shared_ptr));
    resume(w3, Passed::Data(shared_ptr));
    println!("main: broadcasting");
    shared.cv.broadcast();
    resume(w1, Passed::Nothing);
    resume(w2, Passed::Nothing);
    resume(w3, Passed::Nothing);
}
