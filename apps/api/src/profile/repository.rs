use sqlx::PgPool;
use uuid::Uuid;

use crate::models::profile::UserProfileRow;
use crate::profile::ProfileInput;

pub async fn find_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    input: &ProfileInput,
) -> Result<UserProfileRow, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>(
        r#"
        INSERT INTO user_profiles
            (user_id, "current_role", current_company, years_of_experience, target_role,
             target_companies, technical_skills, soft_skills, industries, education,
             certifications, interview_types, difficulty_preference, focus_areas,
             resume_text, bio)
        VALUES ($1, $2, $3, $4, $5,
                COALESCE($6, '{}'), COALESCE($7, '{}'), COALESCE($8, '{}'), COALESCE($9, '{}'),
                $10, $11, COALESCE($12, '{}'), $13, COALESCE($14, '{}'), $15, $16)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&input.current_role)
    .bind(&input.current_company)
    .bind(input.years_of_experience)
    .bind(&input.target_role)
    .bind(&input.target_companies)
    .bind(&input.technical_skills)
    .bind(&input.soft_skills)
    .bind(&input.industries)
    .bind(&input.education)
    .bind(&input.certifications)
    .bind(&input.interview_types)
    .bind(&input.difficulty_preference)
    .bind(&input.focus_areas)
    .bind(&input.resume_text)
    .bind(&input.bio)
    .fetch_one(pool)
    .await
}

/// Applies the fields present in `input`. `None` when the user has no profile.
pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    input: &ProfileInput,
) -> Result<Option<UserProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>(
        r#"
        UPDATE user_profiles SET
            "current_role"        = COALESCE($2, "current_role"),
            current_company       = COALESCE($3, current_company),
            years_of_experience   = COALESCE($4, years_of_experience),
            target_role           = COALESCE($5, target_role),
            target_companies      = COALESCE($6, target_companies),
            technical_skills      = COALESCE($7, technical_skills),
            soft_skills           = COALESCE($8, soft_skills),
            industries            = COALESCE($9, industries),
            education             = COALESCE($10, education),
            certifications        = COALESCE($11, certifications),
            interview_types       = COALESCE($12, interview_types),
            difficulty_preference = COALESCE($13, difficulty_preference),
            focus_areas           = COALESCE($14, focus_areas),
            resume_text           = COALESCE($15, resume_text),
            bio                   = COALESCE($16, bio),
            updated_at            = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&input.current_role)
    .bind(&input.current_company)
    .bind(input.years_of_experience)
    .bind(&input.target_role)
    .bind(&input.target_companies)
    .bind(&input.technical_skills)
    .bind(&input.soft_skills)
    .bind(&input.industries)
    .bind(&input.education)
    .bind(&input.certifications)
    .bind(&input.interview_types)
    .bind(&input.difficulty_preference)
    .bind(&input.focus_areas)
    .bind(&input.resume_text)
    .bind(&input.bio)
    .fetch_optional(pool)
    .await
}

/// Stores extracted resume text, creating an empty profile if needed.
pub async fn set_resume_text(
    pool: &PgPool,
    user_id: Uuid,
    resume_text: &str,
) -> Result<UserProfileRow, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>(
        r#"
        INSERT INTO user_profiles (user_id, resume_text)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET resume_text = EXCLUDED.resume_text, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(resume_text)
    .fetch_one(pool)
    .await
}
