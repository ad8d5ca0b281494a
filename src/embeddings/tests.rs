use super::*;

#[test]
fn normalize_produces_unit_vector() {
    let mut vector = vec![3.0, 4.0];
    normalize(&mut vector);
    assert!((vector[0] - 0.6).abs() < 1e-6);
    assert!((vector[1] - 0.8).abs() < 1e-6);
}

#[test]
fn normalize_leaves_zero_vector() {
    let mut vector = vec![0.0; 4];
    normalize(&mut vector);
    assert!(vector.iter().all(|v| *v == 0.0));
}

#[test]
fn cosine_of_vector_with_itself_is_one() {
    let vector = vec![0.2, -0.4, 0.1, 0.9];
    assert!((cosine_similarity(&vector, &vector) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_ignores_magnitude() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![2.0, 4.0, 6.0];
    assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_bounds() {
    let a = vec![1.0, 0.0];
    let opposite = vec![-1.0, 0.0];
    let orthogonal = vec![0.0, 1.0];
    assert!((cosine_similarity(&a, &opposite) + 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&a, &orthogonal).abs() < 1e-6);
    assert!(cosine_similarity(&a, &[0.0, 0.0]).abs() < f32::EPSILON);
}

#[test]
fn check_vector_rejects_bad_output() {
    assert!(check_vector(&[], None).is_err());
    assert!(check_vector(&[f32::NAN, 1.0], None).is_err());
    assert!(check_vector(&[1.0, 2.0], Some(3)).is_err());
    assert!(check_vector(&[1.0, 2.0, 3.0], Some(3)).is_ok());
}

#[tokio::test]
async fn default_embed_many_matches_embed_one() {
    let embedder = HashingEmbedder::new(32);
    let texts = vec!["Lamu old town".to_string(), "Nairobi National Park".to_string()];

    let batch = embedder.embed_many(&texts).await.expect("should embed");
    for (text, vector) in texts.iter().zip(&batch) {
        let single = embedder.embed_one(text).await.expect("should embed");
        assert_eq!(&single, vector);
    }
}

#[test]
fn from_config_selects_backend() {
    let mut config = Config::default();
    config.embedder.backend = EmbedderBackend::Hashing;
    config.embedder.embedding_dimension = 64;

    let embedder = from_config(&config).expect("should build embedder");
    assert_eq!(embedder.model_name(), "hashing-bow-64");
    assert!(embedder.normalizes());

    config.embedder.backend = EmbedderBackend::Ollama;
    let embedder = from_config(&config).expect("should build embedder");
    assert_eq!(embedder.model_name(), "nomic-embed-text:latest");
}
