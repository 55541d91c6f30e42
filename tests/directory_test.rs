use silo::{
    ActivationId, DirectoryConfig, DirectoryOptionsValidated, GrainAddress, GrainDirectory, GrainId,
    InMemoryDirectoryStore, MembershipVersion, RegisterOutcome, SiloAddress,
};
use slog::Drain;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::test]
async fn concurrent_registrations_have_exactly_one_winner() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let directory = Arc::new(directory());
    let grain = GrainId::new("session", "s-1");
    let candidates: Vec<GrainAddress> = (0..16)
        .map(|i| GrainAddress::new_activation(grain.clone(), silo_at(5000 + i), MembershipVersion::new(1)))
        .collect();

    // -- execute --
    let mut tasks = Vec::with_capacity(candidates.len());
    for candidate in candidates.clone() {
        let directory = directory.clone();
        tasks.push(tokio::spawn(async move { directory.register(&candidate, None).await }));
    }
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        outcomes.push(task.await??);
    }

    // -- verify --
    let winners: Vec<&RegisterOutcome> = outcomes.iter().filter(|o| o.is_registered()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].authoritative().clone();
    assert!(candidates.contains(&winner));

    for outcome in &outcomes {
        assert_eq!(outcome.authoritative(), &winner);
    }
    assert_eq!(directory.lookup(&grain).await?, Some(winner));

    Ok(())
}

#[tokio::test]
async fn register_then_replace_with_known_previous() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let directory = directory();
    let grain = GrainId::new("session", "s-2");
    let a = GrainAddress::new_activation(grain.clone(), silo_at(5100), MembershipVersion::new(1));
    let a_prime = GrainAddress::new_activation(grain.clone(), silo_at(5101), MembershipVersion::new(2));

    // -- execute --
    let first = directory.register(&a, None).await?;
    let second = directory.register(&a_prime, Some(&a)).await?;

    // -- verify --
    assert_eq!(first, RegisterOutcome::Registered(a.clone()));
    assert_eq!(second, RegisterOutcome::Registered(a_prime.clone()));
    assert_eq!(directory.lookup(&grain).await?, Some(a_prime.clone()));

    // `a` is no longer the stored value, so naming it as previous again loses.
    let a_double_prime = GrainAddress::new_activation(grain.clone(), silo_at(5102), MembershipVersion::new(3));
    let third = directory.register(&a_double_prime, Some(&a)).await?;
    assert_eq!(third, RegisterOutcome::RaceLost { winner: a_prime });

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replacements_of_one_previous_have_exactly_one_winner() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let directory = Arc::new(directory());
    let grain = GrainId::new("session", "s-3");
    let original = GrainAddress::new_activation(grain.clone(), silo_at(5300), MembershipVersion::new(1));
    assert!(directory.register(&original, None).await?.is_registered());
    let candidates: Vec<GrainAddress> = (1..=8)
        .map(|i| GrainAddress::new_activation(grain.clone(), silo_at(5300 + i), MembershipVersion::new(2)))
        .collect();

    // -- execute --
    let mut tasks = Vec::with_capacity(candidates.len());
    for candidate in candidates.clone() {
        let directory = directory.clone();
        let previous = original.clone();
        tasks.push(tokio::spawn(async move { directory.register(&candidate, Some(&previous)).await }));
    }
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        outcomes.push(task.await??);
    }

    // -- verify --
    let winners: Vec<&RegisterOutcome> = outcomes.iter().filter(|o| o.is_registered()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].authoritative().clone();
    assert!(candidates.contains(&winner));

    for outcome in outcomes.iter().filter(|o| !o.is_registered()) {
        assert_eq!(outcome, &RegisterOutcome::RaceLost { winner: winner.clone() });
    }
    assert_eq!(directory.lookup(&grain).await?, Some(winner));

    Ok(())
}

#[tokio::test]
async fn batch_unregister_skips_entries_replaced_in_the_meantime() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let directory = directory();
    let entries: Vec<GrainAddress> = (0..25)
        .map(|i| {
            GrainAddress::new_activation(
                GrainId::new("session", format!("batch-{}", i)),
                silo_at(5200),
                MembershipVersion::new(1),
            )
        })
        .collect();
    for entry in &entries {
        assert!(directory.register(entry, None).await?.is_registered());
    }

    let mut replacement = entries[4].clone();
    replacement.activation_id = ActivationId::new();
    assert!(directory.register(&replacement, Some(&entries[4])).await?.is_registered());

    // -- execute --
    let removed = directory.unregister_many(&entries).await?;

    // -- verify --
    assert_eq!(removed, 24);
    assert_eq!(directory.store().len(), 1);
    for (i, entry) in entries.iter().enumerate() {
        let current = directory.lookup(&entry.grain_id).await?;
        if i == 4 {
            assert_eq!(current, Some(replacement.clone()));
        } else {
            assert_eq!(current, None);
        }
    }

    Ok(())
}

// ------- Helpers --------

fn directory() -> GrainDirectory<InMemoryDirectoryStore> {
    let config = DirectoryConfig {
        logger: create_root_logger_for_stdout(),
        options: DirectoryOptionsValidated::default(),
    };

    GrainDirectory::new(config, InMemoryDirectoryStore::new())
}

fn silo_at(port: u16) -> SiloAddress {
    SiloAddress::new(SocketAddr::from(([10, 0, 0, 1], port)), 1)
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("Component" => "directory-test"))
}
