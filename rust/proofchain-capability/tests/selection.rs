//! Selecting claims link by link through a chain of proofs.

use pretty_assertions::assert_eq;
use proofchain_capability::{
    BuildError, Capability, CaveatKind, CaveatSpec, Delegation, Descriptor, Ipld, Match,
    Matcher, MatcherExt, Narrowing, ResourceSchema, Selector, SelfIssued, Source, capability,
};
use proofchain_principal::{Ed25519Signer, Principal};
use std::sync::Arc;
use testresult::TestResult;

fn files() -> Descriptor {
    capability("file/write")
        .with(ResourceSchema::Did)
        .caveat(
            "path",
            CaveatSpec::unconstrained(CaveatKind::String).narrowed_by(Narrowing::Prefix),
        )
        .caveat(
            "tags",
            CaveatSpec::unconstrained(CaveatKind::List).narrowed_by(Narrowing::Subset),
        )
        .build()
}

fn tags(values: &[&str]) -> Ipld {
    Ipld::List(values.iter().map(|tag| Ipld::String(tag.to_string())).collect())
}

fn issue(
    issuer: &Ed25519Signer,
    audience: &Ed25519Signer,
    capabilities: Vec<Capability>,
) -> Result<Arc<Delegation>, BuildError> {
    let builder = capabilities
        .into_iter()
        .fold(Delegation::builder().audience(audience.did()), |builder, c| {
            builder.capability(c)
        });
    Ok(Arc::new(builder.sign(issuer)?))
}

#[test]
fn it_narrows_transitively_until_a_root_is_reached() -> TestResult {
    let (owner, editor, writer) = (
        Ed25519Signer::from_seed(&[1; 32]),
        Ed25519Signer::from_seed(&[2; 32]),
        Ed25519Signer::from_seed(&[3; 32]),
    );
    let space = owner.did();
    let write = |path: &str, granted: &[&str]| {
        Capability::new("file/write", &space)
            .caveat("path", path)
            .caveat("tags", tags(granted))
    };

    let root = issue(&owner, &editor, vec![Capability::new("file/write", &space)])?;
    let middle = issue(&editor, &writer, vec![write("/docs/", &["draft", "final"])])?;
    let invocation = issue(&writer, &writer, vec![write("/docs/notes.md", &["draft"])])?;

    let claimed = files().match_source(&Source::all(&invocation)[0])?;
    assert!(claimed.prune(&SelfIssued::default()).is_some());

    let first = claimed.select(&Source::all(&middle));
    assert_eq!(first.matches.len(), 1);
    assert!(first.matches[0].prune(&SelfIssued::default()).is_some());

    let second = first.matches[0].select(&Source::all(&root));
    assert_eq!(second.matches.len(), 1);
    assert!(second.matches[0].prune(&SelfIssued::default()).is_none());
    Ok(())
}

#[test]
fn it_rejects_paths_and_tags_outside_the_grant() -> TestResult {
    let owner = Ed25519Signer::from_seed(&[1; 32]);
    let space = owner.did();
    let proof = issue(
        &owner,
        &owner,
        vec![
            Capability::new("file/write", &space)
                .caveat("path", "/docs")
                .caveat("tags", tags(&["draft"])),
        ],
    )?;

    for (path, requested) in [("/documents", &["draft"][..]), ("/docs/a", &["final"][..])] {
        let claim = issue(
            &owner,
            &owner,
            vec![
                Capability::new("file/write", &space)
                    .caveat("path", path)
                    .caveat("tags", tags(requested)),
            ],
        )?;
        let claimed = files().match_source(&Source::all(&claim)[0])?;
        let select = claimed.select(&Source::all(&proof));
        assert!(select.matches.is_empty(), "{path} should not be granted");
        assert_eq!(select.errors.len(), 1);
    }
    Ok(())
}

#[test]
fn it_selects_every_combination_of_a_conjunction() -> TestResult {
    let owner = Ed25519Signer::from_seed(&[1; 32]);
    let space = owner.did();
    let read = capability("file/read").with(ResourceSchema::Did).build();
    let delegation = issue(
        &owner,
        &owner,
        vec![
            Capability::new("file/write", &space).caveat("path", "/a"),
            Capability::new("file/write", &space).caveat("path", "/b"),
            Capability::new("file/read", &space),
        ],
    )?;

    let select = files().and(read).select(&Source::all(&delegation));
    assert_eq!(select.matches.len(), 2);
    let paths: Vec<_> = select
        .matches
        .iter()
        .map(|matched| match matched {
            Match::Group(group) => group.members.first().value().nb.get("path").cloned(),
            _ => None,
        })
        .collect();
    assert_eq!(
        paths,
        vec![Some(Ipld::String("/a".into())), Some(Ipld::String("/b".into()))]
    );
    Ok(())
}
