use question_crawler::config::Config;
use question_crawler::infrastructure::{DeviceBridge, Screen};
use question_crawler::models::question::{MultiPartQuestion, SingleQuestion, SubPart};
use question_crawler::models::{latest_document, load_all_documents, QuestionRecord};
use question_crawler::services::record_writer::{JsonRecordWriter, RecordSink};
use question_crawler::utils::logging;
use tokio_test::assert_ok;

fn single(no: &str) -> QuestionRecord {
    QuestionRecord::Single(SingleQuestion {
        course: "内科学".to_string(),
        no: no.to_string(),
        unit: Some("第一章 绪论".to_string()),
        mode: Some("A1型题".to_string()),
        stem: Some("下列哪项是正确的".to_string()),
        options: vec!["A. 甲".to_string(), "B. 乙".to_string()],
        answer: Some("B".to_string()),
        accuracy: "71.2%".to_string(),
        key_point: String::new(),
        discussion: "解析".to_string(),
    })
}

fn multi(no: &str) -> QuestionRecord {
    let part = |label: &str, answer: &str| SubPart {
        label: label.to_string(),
        stem: format!("{}题干", label),
        options: vec!["A. 甲".to_string(), "B. 乙".to_string()],
        answer: Some(answer.to_string()),
        accuracy: String::new(),
        key_point: String::new(),
        discussion: String::new(),
    };
    QuestionRecord::MultiPart(MultiPartQuestion {
        course: "内科学".to_string(),
        no: no.to_string(),
        unit: Some("第一章 绪论".to_string()),
        mode: Some("A3/A4型题".to_string()),
        shared_stem: "患者，男，45岁".to_string(),
        parts: vec![part("第1问", "A"), part("第2问", "B")],
    })
}

#[tokio::test]
async fn test_saved_documents_reload_identically() {
    let dir = tempfile::tempdir().unwrap();
    let writer = JsonRecordWriter::new(dir.path(), "com.yikaobang.yixue");
    let records = vec![single("1/3"), multi("2/3"), single("3/3")];

    for record in &records {
        assert_ok!(writer.persist(record).await);
    }

    let loaded = load_all_documents(dir.path()).await.unwrap();
    assert_eq!(loaded.len(), 3);
    // 文件名是时间戳，排序后与写入顺序一致
    let reloaded: Vec<QuestionRecord> = loaded.into_iter().map(|(_, doc)| doc.record).collect();
    assert_eq!(reloaded, records);

    let (_, latest) = latest_document(dir.path()).await.unwrap().unwrap();
    assert_eq!(latest.record.no(), "3/3");
    assert_eq!(latest.pkg, "com.yikaobang.yixue");
}

#[tokio::test]
async fn test_latest_document_in_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nothing-here");
    assert!(latest_document(&missing).await.unwrap().is_none());
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.app_package, "com.yikaobang.yixue");
    assert_eq!(config.checkpoint_interval, 250);
    assert_eq!(config.max_failures, 5);
    assert_eq!(config.stall_threshold, 3);
}

#[tokio::test]
#[ignore] // 默认忽略，需要设备代理：cargo test -- --ignored
async fn test_device_connection() {
    logging::init();

    let config = Config::from_env();
    let bridge = DeviceBridge::connect(&config.device_url, config.request_timeout_ms)
        .await
        .expect("连接设备代理失败");

    assert!(bridge.width() > 0, "屏幕宽度应该大于 0");
}
