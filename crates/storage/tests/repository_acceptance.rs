use shared::{
    content::{ArticleDraft, ThreadDraft},
    model::Entity,
};
use storage::{Direction, DraftOf, Query, Repository, Storage};

async fn seed<R: Repository>(repo: &R, drafts: Vec<DraftOf<R>>) -> Vec<i64> {
    let mut ids = Vec::new();
    for draft in drafts {
        ids.push(repo.insert(&draft).await.expect("insert").id());
    }
    ids
}

async fn crud_cycle<R: Repository>(repo: R, drafts: Vec<DraftOf<R>>) {
    let ids = seed(&repo, drafts).await;
    assert_eq!(
        repo.count(&Query::new()).await.expect("count") as usize,
        ids.len()
    );

    let newest_first = repo
        .find_all(&Query::new().order_by("id", Direction::Desc).limit(1))
        .await
        .expect("page");
    assert_eq!(newest_first.len(), 1);
    assert_eq!(newest_first[0].id(), *ids.last().expect("ids"));

    for id in &ids {
        assert!(repo.delete(*id).await.expect("delete"));
        assert!(repo.find_by_id(*id).await.expect("load").is_none());
    }
    assert_eq!(repo.count(&Query::new()).await.expect("count"), 0);
}

#[tokio::test]
async fn articles_and_threads_share_the_repository_contract() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    crud_cycle(
        storage.articles(),
        vec![
            ArticleDraft {
                name: "tariffs".into(),
                is_published: true,
                texts: Some("<p>Plans</p>".into()),
            },
            ArticleDraft {
                name: "faq".into(),
                ..ArticleDraft::default()
            },
        ],
    )
    .await;

    crud_cycle(
        storage.threads(),
        vec![
            ThreadDraft {
                subject: "Cannot reach server".into(),
                author_id: Some(1),
                ..ThreadDraft::default()
            },
            ThreadDraft {
                subject: "Invoice question".into(),
                author_id: Some(2),
                responsible_id: Some(9),
                ..ThreadDraft::default()
            },
        ],
    )
    .await;
}
