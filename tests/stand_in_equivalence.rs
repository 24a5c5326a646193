//! The single-process stand-in must be observably identical to a one-rank
//! job: the same script run against `SerialComm`, a one-thread `ThreadComm`,
//! and the communicator handed out by a stand-in `Environment` produces the
//! same buffers and the same errors.

use num_complex::Complex64;
use procomm::parallel::{Comm, Op, SerialComm, ThreadComm};
use procomm::{CommError, CommOptions, Environment, Mode};

/// Everything a one-rank job can observe, collected in order.
#[derive(Debug, PartialEq)]
struct Transcript {
    identity: (usize, usize),
    reduced: Vec<Vec<i32>>,
    gathered: Vec<f64>,
    scattered: [u8; 3],
    broadcast: [Complex64; 2],
    errors: Vec<CommError>,
}

fn script<C: Comm>(comm: &C) -> Transcript {
    let src = [3, -1, 4];
    let reduced = Op::ALL
        .iter()
        .map(|&op| {
            let mut dest = [0; 3];
            comm.all_reduce(op, &mut dest, &src).unwrap();
            let mut rooted = [0; 3];
            comm.reduce(0, op, &mut rooted, &src).unwrap();
            assert_eq!(dest, rooted);
            dest.to_vec()
        })
        .collect();

    let mut gathered = vec![0.0; 2];
    comm.all_gather(&mut gathered, &[0.5, 1.5]).unwrap();
    let mut rooted = vec![0.0; 2];
    comm.gather(0, &mut rooted, &[0.5, 1.5]).unwrap();
    assert_eq!(gathered, rooted);

    let mut scattered = [0u8; 3];
    comm.scatter(0, &mut scattered, &[7, 8, 9]).unwrap();

    let mut broadcast = [Complex64::new(1.0, 2.0), Complex64::new(-3.0, 0.5)];
    comm.bcast(0, &mut broadcast).unwrap();

    comm.barrier().unwrap();

    let z = Complex64::new(0.0, 0.0);
    let errors = vec![
        comm.all_gather(&mut [0u16; 3], &[1, 2]).unwrap_err(),
        comm.reduce(1, Op::Sum, &mut [0i64], &[1]).unwrap_err(),
        comm.all_reduce(Op::Min, &mut [z], &[z]).unwrap_err(),
        comm.send(2, 0, &[1u8]).unwrap_err(),
        comm.new_comm(&[0, 1]).map(|_| ()).unwrap_err(),
    ];

    Transcript {
        identity: (comm.rank(), comm.size()),
        reduced,
        gathered,
        scattered,
        broadcast,
        errors,
    }
}

fn quiet() -> CommOptions {
    CommOptions::stand_in().with_log_errors(false)
}

#[test]
fn serial_matches_single_thread() {
    let serial = script(&SerialComm::new(quiet()));
    let threaded = ThreadComm::run_with(1, quiet(), |comm| script(&comm)).pop().unwrap();
    assert_eq!(serial, threaded);
    assert_eq!(serial.identity, (0, 1));
    assert_eq!(serial.reduced, vec![vec![3, -1, 4]; 4]);
}

#[test]
fn environment_world_matches_serial() {
    let env = Environment::init(quiet()).unwrap();
    assert_eq!(env.mode(), Mode::StandIn);
    let world = env.world();
    assert!(world.is_stand_in());
    assert_eq!(script(&world), script(&SerialComm::new(quiet())));
}

#[test]
fn send_recv_round_trip_is_noop() {
    let comm = SerialComm::new(quiet());
    comm.send(0, 9, &[1.0f32, 2.0]).unwrap();
    let mut buf = [5.0f32; 2];
    comm.recv(0, 9, &mut buf).unwrap();
    assert_eq!(buf, [5.0, 5.0]);
}
