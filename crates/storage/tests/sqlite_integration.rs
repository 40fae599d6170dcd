use placement_core::model::{
    ChatUser, Conversion, ConversionKind, Label, LeadRecord, LevelScale, PartnerId, ReferralCode,
    ReferralLink, UserId,
};
use placement_core::survey::{StartFormat, SurveyAnswers};
use placement_core::time::fixed_now;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{
    ConversionRepository, LeadRepository, ReferralRepository, Storage, StorageError,
    UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn link(platform: &str, partner: u64, rng: &mut StdRng) -> ReferralLink {
    let platform = Label::new(platform).unwrap();
    let partner_id = PartnerId::new(partner);
    ReferralLink {
        code: ReferralCode::generate(&platform, partner_id, rng),
        partner_id,
        platform,
        theme: Label::new("crypto").unwrap(),
        created_at: fixed_now(),
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn users_keep_their_first_referral_code() {
    let repo = connect("memdb_users").await;

    let mut user = ChatUser::new(UserId::new(42), Some("@anna".into()), "Anna", fixed_now());
    user.attribute(&ReferralCode::parse("tiktok_1000_aaaaaa").unwrap());
    repo.upsert_user(&user).await.unwrap();

    let mut later = ChatUser::new(UserId::new(42), None, "Anna K", fixed_now());
    later.attribute(&ReferralCode::parse("youtube_2000_bbbbbb").unwrap());
    repo.upsert_user(&later).await.unwrap();

    let stored = repo.get_user(UserId::new(42)).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Anna K");
    assert_eq!(stored.username, None);
    assert_eq!(
        stored.referral_code.as_ref().map(ReferralCode::as_str),
        Some("tiktok_1000_aaaaaa")
    );
    assert!(repo.get_user(UserId::new(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn links_and_conversions_round_trip() {
    let repo = connect("memdb_links").await;
    let mut rng = StdRng::seed_from_u64(3);

    let tiktok = link("tiktok", 1000, &mut rng);
    let youtube = link("youtube", 1000, &mut rng);
    let other = link("tiktok", 2000, &mut rng);
    for l in [&tiktok, &youtube, &other] {
        repo.insert_link(l).await.unwrap();
    }
    assert!(matches!(
        repo.insert_link(&tiktok).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_link(&tiktok.code).await.unwrap().unwrap();
    assert_eq!(fetched, tiktok);
    assert_eq!(repo.list_links().await.unwrap().len(), 3);
    assert_eq!(
        repo.links_for_partner(PartnerId::new(1000)).await.unwrap().len(),
        2
    );

    for kind in [ConversionKind::Click, ConversionKind::Start, ConversionKind::Complete] {
        repo.append_conversion(&Conversion::for_link(&tiktok, kind, fixed_now()))
            .await
            .unwrap();
    }
    repo.append_conversion(&Conversion::for_link(&other, ConversionKind::Click, fixed_now()))
        .await
        .unwrap();

    let mine = repo
        .conversions_for_partner(PartnerId::new(1000))
        .await
        .unwrap();
    let kinds: Vec<_> = mine.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        [ConversionKind::Click, ConversionKind::Start, ConversionKind::Complete]
    );
    assert_eq!(repo.count_conversions().await.unwrap(), 4);
}

#[tokio::test]
async fn conversion_for_unknown_code_is_not_found() {
    let repo = connect("memdb_orphan").await;
    let mut rng = StdRng::seed_from_u64(9);
    let unknown = link("tiktok", 1000, &mut rng);

    let res = repo
        .append_conversion(&Conversion::for_link(&unknown, ConversionKind::Click, fixed_now()))
        .await;
    assert!(matches!(res, Err(StorageError::NotFound)));
}

#[tokio::test]
async fn leads_round_trip_with_and_without_quiz() {
    let storage = Storage::sqlite("sqlite:file:memdb_leads?mode=memory&cache=shared")
        .await
        .expect("storage");

    let with_quiz = LeadRecord {
        submitted_at: fixed_now(),
        user_id: UserId::new(1),
        name: "Anna".into(),
        username: Some("anna".into()),
        quiz: Some(LevelScale::default_english().outcome(7, 9)),
        answers: SurveyAnswers {
            goal: Some("Для роботи".into()),
            motivation: Some(4),
            needs_help: Some(true),
            format: Some(StartFormat::TrialFirst),
            phone: Some("+380671234567".into()),
            ..SurveyAnswers::default()
        },
        referral_code: Some(ReferralCode::parse("tiktok_1000_aaaaaa").unwrap()),
    };
    let bare = LeadRecord {
        submitted_at: fixed_now(),
        user_id: UserId::new(2),
        name: "Bo".into(),
        username: None,
        quiz: None,
        answers: SurveyAnswers::default(),
        referral_code: None,
    };

    let first = storage.leads.append_lead(&with_quiz).await.unwrap();
    let second = storage.leads.append_lead(&bare).await.unwrap();
    assert!(second > first);

    let leads = storage.leads.list_leads(10).await.unwrap();
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0], bare);
    assert_eq!(leads[1], with_quiz);
    assert_eq!(leads[1].sheet_row(), with_quiz.sheet_row());
}
